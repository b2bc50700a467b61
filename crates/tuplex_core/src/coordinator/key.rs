//! Key coordinator.

use super::{mismatch, CoordinationData, Coordinator, CoordinatorKind, EntryMap};
use crate::entry::{Entry, EntryId};
use crate::error::{CoreError, CoreResult};
use crate::isolation::IsolationManager;
use crate::selector::{ChainSelector, EntrySelector, SelectionStrategy, Selector, SelectorKind};
use crate::types::SubTransactionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use tuplex_storage::StorageTxn;

#[derive(Debug, Default)]
struct KeyIndex {
    by_key: HashMap<String, Vec<EntryId>>,
    by_entry: HashMap<EntryId, String>,
}

/// Selects entries by a unique key passed as [`CoordinationData::Key`].
///
/// A key maps to one visible entry. Writing a second entry under a key is
/// only accepted when the writer is also removing every entry currently
/// registered under it, which makes take-then-write an overwrite.
#[derive(Debug)]
pub struct KeyCoordinator {
    name: String,
    entries: EntryMap,
    index: RwLock<KeyIndex>,
}

impl KeyCoordinator {
    /// Creates an empty key coordinator.
    #[must_use]
    pub fn new(name: impl Into<String>, entries: EntryMap) -> Self {
        Self {
            name: name.into(),
            entries,
            index: RwLock::new(KeyIndex::default()),
        }
    }

    /// Returns the key an entry is registered under.
    #[must_use]
    pub fn key_of(&self, entry: EntryId) -> Option<String> {
        self.index.read().by_entry.get(&entry).cloned()
    }

    fn entries_for(&self, key: &str) -> CoreResult<Vec<Entry>> {
        let ids = self
            .index
            .read()
            .by_key
            .get(key)
            .cloned()
            .unwrap_or_default();
        self.entries.resolve(ids)
    }
}

impl Coordinator for KeyCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CoordinatorKind {
        CoordinatorKind::Key
    }

    fn register_entry(
        &self,
        stx: SubTransactionId,
        data: &[CoordinationData],
        entry: &Entry,
        isolation: &IsolationManager,
    ) -> CoreResult<()> {
        let Some(key) = data.iter().find_map(|d| match d {
            CoordinationData::Key(key) => Some(key),
        }) else {
            return Err(CoreError::MissingCoordinationData {
                coordinator: self.name.clone(),
            });
        };

        let mut index = self.index.write();
        if let Some(existing) = index.by_key.get(key) {
            if let Some(base) = existing
                .iter()
                .find(|base| !isolation.check_valid_entry_overwrite(**base, entry.id()))
            {
                debug!(%key, base = %base, entry = %entry.id(), "duplicate key");
                return Err(CoreError::DuplicateKey { key: key.clone() });
            }
        }
        if self.entries.insert(entry, Some(stx.storage_txn()))? {
            index.by_key.entry(key.clone()).or_default().push(entry.id());
            index.by_entry.insert(entry.id(), key.clone());
        }
        Ok(())
    }

    fn unregister_entry(&self, entry: EntryId, txn: Option<StorageTxn>) -> CoreResult<bool> {
        let mut index = self.index.write();
        if let Some(key) = index.by_entry.remove(&entry) {
            if let Some(ids) = index.by_key.get_mut(&key) {
                ids.retain(|id| *id != entry);
                if ids.is_empty() {
                    index.by_key.remove(&key);
                }
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
        *self.index.write() = KeyIndex::default();
        self.entries.destroy()
    }

    fn create_selector(
        self: Arc<Self>,
        selector: &Selector,
        predecessor: Option<Box<dyn EntrySelector>>,
    ) -> CoreResult<Box<dyn EntrySelector>> {
        match selector.kind() {
            SelectorKind::Key(key) => Ok(Box::new(ChainSelector::new(
                KeyStrategy {
                    key: key.clone(),
                    coordinator: self,
                },
                selector.count(),
                predecessor,
            ))),
            _ => Err(mismatch(&*self, selector)),
        }
    }
}

struct KeyStrategy {
    coordinator: Arc<KeyCoordinator>,
    key: String,
}

impl SelectionStrategy for KeyStrategy {
    fn candidates(&mut self) -> CoreResult<Vec<Entry>> {
        self.coordinator.entries_for(&self.key)
    }

    fn admits(&self, entry: &Entry) -> CoreResult<bool> {
        Ok(self.coordinator.key_of(entry.id()).as_deref() == Some(self.key.as_str()))
    }
}
