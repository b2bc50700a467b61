//! Transaction manager.

use super::log::LogContext;
use super::state::Transaction;
use crate::error::CoreResult;
use crate::types::{IsolationLevel, TransactionId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Allocates transaction IDs and tracks running transactions.
///
/// The manager never blocks: there is no writer lock, conflicts are
/// resolved per entry by the isolation manager.
#[derive(Debug)]
pub struct TransactionManager {
    /// Next transaction ID.
    next_txid: AtomicU64,
    /// Active transactions.
    active_txns: RwLock<Vec<TransactionId>>,
}

impl TransactionManager {
    /// Creates a new transaction manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_txid: AtomicU64::new(1),
            active_txns: RwLock::new(Vec::new()),
        }
    }

    /// Begins a new transaction.
    pub fn begin(&self, level: IsolationLevel) -> Arc<Transaction> {
        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        self.active_txns.write().push(txid);
        debug!(txn = %txid, %level, "transaction started");
        Arc::new(Transaction::new(txid, level))
    }

    /// Commits a transaction.
    ///
    /// # Errors
    ///
    /// See [`Transaction::commit`]. The transaction stays active when the
    /// commit was refused outright.
    pub fn commit(&self, txn: &Transaction, ctx: &LogContext<'_>) -> CoreResult<()> {
        let result = txn.commit(ctx);
        self.forget_finished(txn);
        result
    }

    /// Rolls a transaction back.
    ///
    /// # Errors
    ///
    /// See [`Transaction::rollback`].
    pub fn rollback(&self, txn: &Transaction, ctx: &LogContext<'_>) -> CoreResult<()> {
        let result = txn.rollback(ctx);
        self.forget_finished(txn);
        result
    }

    fn forget_finished(&self, txn: &Transaction) {
        if txn.status().is_terminal() {
            let id = txn.id();
            self.active_txns.write().retain(|&active| active != id);
        }
    }

    /// Returns true if the transaction has not finished.
    #[must_use]
    pub fn is_active(&self, id: TransactionId) -> bool {
        self.active_txns.read().contains(&id)
    }

    /// Returns the number of active transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_txns.read().len()
    }

    /// Returns the IDs of active transactions, oldest first.
    #[must_use]
    pub fn active_transactions(&self) -> Vec<TransactionId> {
        self.active_txns.read().clone()
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerRegistry;
    use crate::isolation::IsolationManager;

    #[test]
    fn ids_are_monotonic() {
        let tm = TransactionManager::new();
        let a = tm.begin(IsolationLevel::ReadCommitted);
        let b = tm.begin(IsolationLevel::RepeatableRead);
        assert!(a.id() < b.id());
        assert_eq!(b.isolation_level(), IsolationLevel::RepeatableRead);
        assert_eq!(tm.active_transactions(), vec![a.id(), b.id()]);
    }

    #[test]
    fn finished_transactions_leave_active_set() {
        let isolation = IsolationManager::new();
        let containers = ContainerRegistry::new();
        let ctx = LogContext {
            isolation: &isolation,
            containers: &containers,
        };
        let tm = TransactionManager::new();

        let a = tm.begin(IsolationLevel::RepeatableRead);
        let b = tm.begin(IsolationLevel::RepeatableRead);
        tm.commit(&a, &ctx).unwrap();
        tm.rollback(&b, &ctx).unwrap();
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn refused_commit_keeps_transaction_active() {
        let isolation = IsolationManager::new();
        let containers = ContainerRegistry::new();
        let ctx = LogContext {
            isolation: &isolation,
            containers: &containers,
        };
        let tm = TransactionManager::new();

        let txn = tm.begin(IsolationLevel::RepeatableRead);
        let _open = txn.begin_sub_transaction().unwrap();
        assert!(tm.commit(&txn, &ctx).is_err());
        assert!(tm.is_active(txn.id()));
    }
}
