//! Registration-only coordinator.

use super::{mismatch, CoordinationData, Coordinator, CoordinatorKind};
use crate::entry::{Entry, EntryId};
use crate::error::CoreResult;
use crate::isolation::IsolationManager;
use crate::selector::{EntrySelector, Selector};
use crate::types::SubTransactionId;
use std::sync::Arc;
use tuplex_storage::StorageTxn;

/// Accepts every registration and keeps nothing.
///
/// A container with only this coordinator can be written to but offers
/// nothing to select from.
#[derive(Debug)]
pub struct NoOperationCoordinator {
    name: String,
}

impl NoOperationCoordinator {
    /// Creates the coordinator.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Coordinator for NoOperationCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CoordinatorKind {
        CoordinatorKind::NoOperation
    }

    fn register_entry(
        &self,
        _stx: SubTransactionId,
        _data: &[CoordinationData],
        _entry: &Entry,
        _isolation: &IsolationManager,
    ) -> CoreResult<()> {
        Ok(())
    }

    fn unregister_entry(&self, _entry: EntryId, _txn: Option<StorageTxn>) -> CoreResult<bool> {
        Ok(false)
    }

    fn contains(&self, _entry: EntryId) -> CoreResult<bool> {
        Ok(false)
    }

    fn len(&self) -> CoreResult<usize> {
        Ok(0)
    }

    fn destroy(&self) -> CoreResult<()> {
        Ok(())
    }

    fn create_selector(
        self: Arc<Self>,
        selector: &Selector,
        _predecessor: Option<Box<dyn EntrySelector>>,
    ) -> CoreResult<Box<dyn EntrySelector>> {
        Err(mismatch(&*self, selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::selector::Count;

    #[test]
    fn registers_nothing_and_selects_nothing() {
        let c = Arc::new(NoOperationCoordinator::new("noop"));
        let entry = Entry::new(1);
        c.register_entry(
            SubTransactionId::new(crate::types::TransactionId::new(1), 1),
            &[],
            &entry,
            &IsolationManager::new(),
        )
        .unwrap();
        assert!(!c.contains(entry.id()).unwrap());
        assert!(c.is_empty().unwrap());
        assert!(matches!(
            c.create_selector(&Selector::random(Count::Max), None),
            Err(CoreError::UnsupportedSelector { .. })
        ));
    }
}
