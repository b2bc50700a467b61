//! Transaction state.

use super::log::{LogContext, OperationLog};
use super::sub_transaction::SubTransaction;
use crate::error::{CoreError, CoreResult};
use crate::types::{IsolationLevel, SubTransactionId, TransactionId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Status of a transaction or sub-transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// Operations may be performed.
    Running,
    /// Commit is replaying the log.
    Committing,
    /// Committed.
    Committed,
    /// Rollback is replaying the log.
    Aborting,
    /// Rolled back.
    Aborted,
}

impl TransactionStatus {
    /// Returns true for `Committed` and `Aborted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::Aborting => "aborting",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// A root unit of work.
///
/// Operations run in sub-transactions started with
/// [`begin_sub_transaction`](Self::begin_sub_transaction). A committed
/// sub-transaction hands its log to the transaction, which replays the
/// merged log once it commits or rolls back itself.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    level: IsolationLevel,
    status: Mutex<TransactionStatus>,
    next_sub: AtomicU32,
    /// Only changed while `status` is locked.
    open_children: AtomicUsize,
    log: Mutex<OperationLog>,
}

impl Transaction {
    /// Creates a running transaction.
    pub(crate) fn new(id: TransactionId, level: IsolationLevel) -> Self {
        Self {
            id,
            level,
            status: Mutex::new(TransactionStatus::Running),
            next_sub: AtomicU32::new(1),
            open_children: AtomicUsize::new(0),
            log: Mutex::new(OperationLog::new()),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the isolation level of the transaction's operations.
    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.level
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        *self.status.lock()
    }

    /// Returns true while the transaction accepts operations.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status() == TransactionStatus::Running
    }

    /// Returns the number of sub-transactions that have not finished.
    #[must_use]
    pub fn open_children(&self) -> usize {
        self.open_children.load(Ordering::SeqCst)
    }

    /// Returns the number of merged log items.
    #[must_use]
    pub fn log_len(&self) -> usize {
        self.log.lock().len()
    }

    /// Starts a sub-transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] unless the transaction is running.
    pub fn begin_sub_transaction(self: &Arc<Self>) -> CoreResult<SubTransaction> {
        let status = self.status.lock();
        if *status != TransactionStatus::Running {
            return Err(CoreError::invalid_operation(format!(
                "{} is {}",
                self.id, *status
            )));
        }
        self.open_children.fetch_add(1, Ordering::SeqCst);
        let seq = self.next_sub.fetch_add(1, Ordering::SeqCst);
        Ok(SubTransaction::new(
            SubTransactionId::new(self.id, seq),
            Arc::clone(self),
        ))
    }

    pub(crate) fn child_finished(&self, log: OperationLog) {
        let _status = self.status.lock();
        self.log.lock().merge(log);
        self.open_children.fetch_sub(1, Ordering::SeqCst);
    }

    /// Moves a running transaction without open children into `next`.
    fn finish_begin(&self, next: TransactionStatus) -> CoreResult<()> {
        let mut status = self.status.lock();
        if *status != TransactionStatus::Running {
            return Err(CoreError::invalid_operation(format!(
                "{} is {}",
                self.id, *status
            )));
        }
        let open = self.open_children.load(Ordering::SeqCst);
        if open > 0 {
            return Err(CoreError::invalid_operation(format!(
                "{} has {open} open sub-transaction(s)",
                self.id
            )));
        }
        *status = next;
        Ok(())
    }

    /// Commits the transaction: releases surrendered holders and applies
    /// pending takes and container destructions.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidOperation`] if the transaction is not running
    ///   or has open sub-transactions.
    /// - The first error raised while replaying the log. The remaining
    ///   items are still replayed and the transaction ends committed.
    pub fn commit(&self, ctx: &LogContext<'_>) -> CoreResult<()> {
        self.finish_begin(TransactionStatus::Committing)?;
        let log = std::mem::take(&mut *self.log.lock());
        let result = log.commit_transaction(ctx, self.id);
        *self.status.lock() = TransactionStatus::Committed;
        debug!(txn = %self.id, items = log.len(), "transaction committed");
        result
    }

    /// Rolls the transaction back, undoing every merged operation.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidOperation`] if the transaction is not running
    ///   or has open sub-transactions.
    /// - The first error raised while replaying the log.
    pub fn rollback(&self, ctx: &LogContext<'_>) -> CoreResult<()> {
        self.finish_begin(TransactionStatus::Aborting)?;
        let log = std::mem::take(&mut *self.log.lock());
        let result = log.rollback_transaction(ctx, self.id);
        *self.status.lock() = TransactionStatus::Aborted;
        debug!(txn = %self.id, items = log.len(), "transaction rolled back");
        result
    }
}
