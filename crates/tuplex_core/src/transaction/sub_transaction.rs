//! Sub-transactions.

use super::log::{LogContext, LogItem, OperationLog};
use super::state::{Transaction, TransactionStatus};
use crate::error::{CoreError, CoreResult};
use crate::types::{IsolationLevel, SubTransactionId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A nested unit of work inside a [`Transaction`].
///
/// Every operation the sub-transaction performs is logged. `commit` and
/// `rollback` are single-shot; whichever runs first decides the outcome.
#[derive(Debug)]
pub struct SubTransaction {
    id: SubTransactionId,
    parent: Arc<Transaction>,
    status: Mutex<TransactionStatus>,
    finished: AtomicBool,
    log: Mutex<OperationLog>,
}

impl SubTransaction {
    pub(crate) fn new(id: SubTransactionId, parent: Arc<Transaction>) -> Self {
        Self {
            id,
            parent,
            status: Mutex::new(TransactionStatus::Running),
            finished: AtomicBool::new(false),
            log: Mutex::new(OperationLog::new()),
        }
    }

    /// Returns the sub-transaction ID.
    #[must_use]
    pub fn id(&self) -> SubTransactionId {
        self.id
    }

    /// Returns the parent transaction.
    #[must_use]
    pub fn parent(&self) -> &Arc<Transaction> {
        &self.parent
    }

    /// Returns the isolation level inherited from the parent.
    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.parent.isolation_level()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        *self.status.lock()
    }

    /// Returns the number of logged items.
    #[must_use]
    pub fn log_len(&self) -> usize {
        self.log.lock().len()
    }

    /// Records an operation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] once the sub-transaction finished.
    pub fn log(&self, item: LogItem) -> CoreResult<()> {
        if self.status() != TransactionStatus::Running {
            return Err(CoreError::invalid_operation(format!(
                "{} is {}",
                self.id,
                self.status()
            )));
        }
        self.log.lock().push(item);
        Ok(())
    }

    fn finish(&self) -> CoreResult<()> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(CoreError::invalid_operation(format!(
                "{} already finished",
                self.id
            )));
        }
        Ok(())
    }

    /// Surrenders the holders to the parent and merges the log into it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidOperation`] if commit or rollback already ran.
    /// - The first replay failure. The log is merged regardless, so the
    ///   parent can still undo it.
    pub fn commit(&self, ctx: &LogContext<'_>) -> CoreResult<()> {
        self.finish()?;
        *self.status.lock() = TransactionStatus::Committing;
        let log = std::mem::take(&mut *self.log.lock());
        let result = log.commit_sub_transaction(ctx, self.id);
        *self.status.lock() = TransactionStatus::Committed;
        debug!(stx = %self.id, items = log.len(), "sub-transaction committed");
        self.parent.child_finished(log);
        result
    }

    /// Undoes every logged operation.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidOperation`] if commit or rollback already ran.
    /// - The first replay failure.
    pub fn rollback(&self, ctx: &LogContext<'_>) -> CoreResult<()> {
        self.finish()?;
        *self.status.lock() = TransactionStatus::Aborting;
        let log = std::mem::take(&mut *self.log.lock());
        let result = log.rollback_sub_transaction(ctx, self.id);
        *self.status.lock() = TransactionStatus::Aborted;
        debug!(stx = %self.id, items = log.len(), "sub-transaction rolled back");
        self.parent.child_finished(OperationLog::new());
        result
    }
}
