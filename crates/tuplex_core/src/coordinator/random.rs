//! Random coordinator.

use super::{mismatch, CoordinationData, Coordinator, CoordinatorKind, EntryMap};
use crate::entry::{Entry, EntryId};
use crate::error::CoreResult;
use crate::isolation::IsolationManager;
use crate::selector::{ChainSelector, EntrySelector, SelectionStrategy, Selector, SelectorKind};
use crate::types::SubTransactionId;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tuplex_storage::StorageTxn;

/// Selects entries in uniformly random order.
///
/// Every `get_all` reshuffles the full entry set. With a seed the order
/// is reproducible across runs.
#[derive(Debug)]
pub struct RandomCoordinator {
    name: String,
    entries: EntryMap,
    rng: Mutex<StdRng>,
}

impl RandomCoordinator {
    /// Creates a coordinator; `seed` fixes the shuffle sequence.
    #[must_use]
    pub fn new(name: impl Into<String>, entries: EntryMap, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            name: name.into(),
            entries,
            rng: Mutex::new(rng),
        }
    }

    fn shuffled(&self) -> CoreResult<Vec<Entry>> {
        let mut entries = self.entries.entries()?;
        // Storage order is arbitrary; sort so a seed fully determines the result.
        entries.sort_by_key(Entry::id);
        entries.shuffle(&mut *self.rng.lock());
        Ok(entries)
    }
}

impl Coordinator for RandomCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CoordinatorKind {
        CoordinatorKind::Random
    }

    fn register_entry(
        &self,
        stx: SubTransactionId,
        _data: &[CoordinationData],
        entry: &Entry,
        _isolation: &IsolationManager,
    ) -> CoreResult<()> {
        self.entries.insert(entry, Some(stx.storage_txn()))?;
        Ok(())
    }

    fn unregister_entry(&self, entry: EntryId, txn: Option<StorageTxn>) -> CoreResult<bool> {
        Ok(self.entries.remove(entry, txn)?.is_some())
    }

    fn contains(&self, entry: EntryId) -> CoreResult<bool> {
        self.entries.contains(entry)
    }

    fn len(&self) -> CoreResult<usize> {
        self.entries.len()
    }

    fn destroy(&self) -> CoreResult<()> {
        self.entries.destroy()
    }

    fn create_selector(
        self: Arc<Self>,
        selector: &Selector,
        predecessor: Option<Box<dyn EntrySelector>>,
    ) -> CoreResult<Box<dyn EntrySelector>> {
        match selector.kind() {
            SelectorKind::Random => Ok(Box::new(ChainSelector::new(
                RandomStrategy { coordinator: self },
                selector.count(),
                predecessor,
            ))),
            _ => Err(mismatch(&*self, selector)),
        }
    }
}

struct RandomStrategy {
    coordinator: Arc<RandomCoordinator>,
}

impl SelectionStrategy for RandomStrategy {
    fn candidates(&mut self) -> CoreResult<Vec<Entry>> {
        self.coordinator.shuffled()
    }

    fn admits(&self, entry: &Entry) -> CoreResult<bool> {
        self.coordinator.contains(entry.id())
    }

    fn reorders(&self) -> bool {
        true
    }

    fn refine<'s>(
        &'s self,
        admitted: Box<dyn Iterator<Item = Entry> + 's>,
    ) -> Box<dyn Iterator<Item = Entry> + 's> {
        let mut entries: Vec<Entry> = admitted.collect();
        entries.shuffle(&mut *self.coordinator.rng.lock());
        Box::new(entries.into_iter())
    }
}
