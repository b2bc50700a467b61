//! Fifo coordinator.

use super::{mismatch, CoordinationData, Coordinator, CoordinatorKind, EntryMap};
use crate::entry::{Entry, EntryId};
use crate::error::CoreResult;
use crate::isolation::IsolationManager;
use crate::selector::{ChainSelector, EntrySelector, SelectionStrategy, Selector, SelectorKind};
use crate::types::SubTransactionId;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tuplex_storage::StorageTxn;

#[derive(Debug, Default)]
struct Queue {
    next_seq: u64,
    order: BTreeMap<u64, EntryId>,
    positions: HashMap<EntryId, u64>,
}

/// Selects entries in the order they were registered.
#[derive(Debug)]
pub struct FifoCoordinator {
    name: String,
    entries: EntryMap,
    queue: RwLock<Queue>,
}

impl FifoCoordinator {
    /// Creates an empty fifo coordinator.
    #[must_use]
    pub fn new(name: impl Into<String>, entries: EntryMap) -> Self {
        Self {
            name: name.into(),
            entries,
            queue: RwLock::new(Queue::default()),
        }
    }

    fn in_order(&self) -> CoreResult<Vec<Entry>> {
        let ids: Vec<EntryId> = self.queue.read().order.values().copied().collect();
        self.entries.resolve(ids)
    }
}

impl Coordinator for FifoCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CoordinatorKind {
        CoordinatorKind::Fifo
    }

    fn register_entry(
        &self,
        stx: SubTransactionId,
        _data: &[CoordinationData],
        entry: &Entry,
        _isolation: &IsolationManager,
    ) -> CoreResult<()> {
        if self.entries.insert(entry, Some(stx.storage_txn()))? {
            let mut queue = self.queue.write();
            let seq = queue.next_seq;
            queue.next_seq += 1;
            queue.order.insert(seq, entry.id());
            queue.positions.insert(entry.id(), seq);
        }
        Ok(())
    }

    fn unregister_entry(&self, entry: EntryId, txn: Option<StorageTxn>) -> CoreResult<bool> {
        {
            let mut queue = self.queue.write();
            if let Some(seq) = queue.positions.remove(&entry) {
                queue.order.remove(&seq);
            }
        }
        Ok(self.entries.remove(entry, txn)?.is_some())
    }

    fn contains(&self, entry: EntryId) -> CoreResult<bool> {
        self.entries.contains(entry)
    }

    fn len(&self) -> CoreResult<usize> {
        self.entries.len()
    }

    fn destroy(&self) -> CoreResult<()> {
        *self.queue.write() = Queue::default();
        self.entries.destroy()
    }

    fn create_selector(
        self: Arc<Self>,
        selector: &Selector,
        predecessor: Option<Box<dyn EntrySelector>>,
    ) -> CoreResult<Box<dyn EntrySelector>> {
        match selector.kind() {
            SelectorKind::Fifo => Ok(Box::new(ChainSelector::new(
                FifoStrategy { coordinator: self },
                selector.count(),
                predecessor,
            ))),
            _ => Err(mismatch(&*self, selector)),
        }
    }
}

struct FifoStrategy {
    coordinator: Arc<FifoCoordinator>,
}

impl SelectionStrategy for FifoStrategy {
    fn candidates(&mut self) -> CoreResult<Vec<Entry>> {
        self.coordinator.in_order()
    }

    fn admits(&self, entry: &Entry) -> CoreResult<bool> {
        self.coordinator.contains(entry.id())
    }
}
