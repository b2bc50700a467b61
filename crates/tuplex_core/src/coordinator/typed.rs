//! Type coordinator.

use super::{mismatch, CoordinationData, Coordinator, CoordinatorKind, EntryMap};
use crate::entry::{Entry, EntryId, EntryType};
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
struct TypeIndex {
    /// Entries per exact type, in registration order.
    buckets: HashMap<EntryType, Vec<EntryId>>,
    /// Types with at least one registered entry, in first-seen order.
    active: Arc<[EntryType]>,
}

impl TypeIndex {
    fn add(&mut self, entry: &Entry) {
        let ty = entry.entry_type();
        let bucket = self.buckets.entry(ty.clone()).or_default();
        if bucket.is_empty() {
            let mut active = self.active.to_vec();
            active.push(ty.clone());
            self.active = active.into();
        }
        bucket.push(entry.id());
    }

    fn remove(&mut self, entry: &Entry) {
        let ty = entry.entry_type();
        let Some(bucket) = self.buckets.get_mut(ty) else {
            return;
        };
        bucket.retain(|id| *id != entry.id());
        if bucket.is_empty() {
            self.buckets.remove(ty);
            self.active = self.active.iter().filter(|t| *t != ty).cloned().collect();
        }
    }

    fn ids_for(&self, requested: &[EntryType]) -> Vec<EntryId> {
        self.active
            .iter()
            .filter(|ty| matches_any(ty, requested))
            .filter_map(|ty| self.buckets.get(ty))
            .flatten()
            .copied()
            .collect()
    }
}

/// An empty request matches every type.
fn matches_any(ty: &EntryType, requested: &[EntryType]) -> bool {
    requested.is_empty() || requested.iter().any(|r| ty.is_subtype_of(r))
}

/// Selects entries by type, subtypes included.
///
/// An optional allow-list restricts which types may be written into the
/// container at all.
#[derive(Debug)]
pub struct TypeCoordinator {
    name: String,
    entries: EntryMap,
    allowed: Vec<EntryType>,
    index: RwLock<TypeIndex>,
}

impl TypeCoordinator {
    /// Creates a coordinator; an empty `allowed` list accepts every type.
    #[must_use]
    pub fn new(name: impl Into<String>, entries: EntryMap, allowed: Vec<EntryType>) -> Self {
        Self {
            name: name.into(),
            entries,
            allowed,
            index: RwLock::new(TypeIndex::default()),
        }
    }

    /// Types currently holding at least one entry.
    #[must_use]
    pub fn active_types(&self) -> Arc<[EntryType]> {
        Arc::clone(&self.index.read().active)
    }

    fn candidates_for(&self, requested: &[EntryType]) -> CoreResult<Vec<Entry>> {
        let ids = self.index.read().ids_for(requested);
        self.entries.resolve(ids)
    }
}

impl Coordinator for TypeCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CoordinatorKind {
        CoordinatorKind::Type
    }

    fn register_entry(
        &self,
        stx: SubTransactionId,
        _data: &[CoordinationData],
        entry: &Entry,
        _isolation: &IsolationManager,
    ) -> CoreResult<()> {
        if !self.allowed.is_empty() && !matches_any(entry.entry_type(), &self.allowed) {
            debug!(
                entry = %entry.id(),
                entry_type = %entry.entry_type(),
                coordinator = %self.name,
                "entry type rejected"
            );
            return Err(CoreError::InvalidEntryType {
                type_name: entry.entry_type().name().to_string(),
            });
        }
        if self.entries.insert(entry, Some(stx.storage_txn()))? {
            self.index.write().add(entry);
        }
        Ok(())
    }

    fn unregister_entry(&self, entry: EntryId, txn: Option<StorageTxn>) -> CoreResult<bool> {
        match self.entries.remove(entry, txn)? {
            Some(removed) => {
                self.index.write().remove(&removed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn contains(&self, entry: EntryId) -> CoreResult<bool> {
        self.entries.contains(entry)
    }

    fn len(&self) -> CoreResult<usize> {
        self.entries.len()
    }

    fn destroy(&self) -> CoreResult<()> {
        *self.index.write() = TypeIndex::default();
        self.entries.destroy()
    }

    fn create_selector(
        self: Arc<Self>,
        selector: &Selector,
        predecessor: Option<Box<dyn EntrySelector>>,
    ) -> CoreResult<Box<dyn EntrySelector>> {
        match selector.kind() {
            SelectorKind::Type(types) => Ok(Box::new(ChainSelector::new(
                TypeStrategy {
                    types: types.clone(),
                    coordinator: self,
                },
                selector.count(),
                predecessor,
            ))),
            _ => Err(mismatch(&*self, selector)),
        }
    }
}

struct TypeStrategy {
    coordinator: Arc<TypeCoordinator>,
    types: Vec<EntryType>,
}

impl SelectionStrategy for TypeStrategy {
    fn candidates(&mut self) -> CoreResult<Vec<Entry>> {
        self.coordinator.candidates_for(&self.types)
    }

    fn admits(&self, entry: &Entry) -> CoreResult<bool> {
        Ok(matches_any(entry.entry_type(), &self.types) && self.coordinator.contains(entry.id())?)
    }
}
