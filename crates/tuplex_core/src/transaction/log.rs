//! Operation log of a (sub-)transaction.

use crate::container::{Container, ContainerRegistry};
use crate::entry::EntryId;
use crate::error::CoreResult;
use crate::isolation::{ContainerOperation, EntryOperation, IsolationManager, Owner};
use crate::types::{ContainerId, SubTransactionId, TransactionId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};
use tuplex_storage::StorageTxn;

/// Log a [`LogItem`] is kept in. The category fixes the replay position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Entry writes.
    Insert,
    /// Repeatable-read entry reads.
    Read,
    /// Entry takes and deletes.
    Delete,
    /// Container locks.
    Lock,
    /// Container creation and destruction.
    Other,
}

impl LogCategory {
    const fn index(self) -> usize {
        match self {
            Self::Insert => 0,
            Self::Read => 1,
            Self::Delete => 2,
            Self::Lock => 3,
            Self::Other => 4,
        }
    }
}

/// Replay order on commit.
pub const COMMIT_ORDER: [LogCategory; 5] = [
    LogCategory::Insert,
    LogCategory::Read,
    LogCategory::Delete,
    LogCategory::Lock,
    LogCategory::Other,
];

/// Replay order on rollback. Each log is additionally walked newest first.
pub const ROLLBACK_ORDER: [LogCategory; 5] = [
    LogCategory::Delete,
    LogCategory::Read,
    LogCategory::Insert,
    LogCategory::Lock,
    LogCategory::Other,
];

/// What the log hooks operate on.
#[derive(Clone, Copy)]
pub struct LogContext<'a> {
    /// Lock owner.
    pub isolation: &'a IsolationManager,
    /// Live containers.
    pub containers: &'a ContainerRegistry,
}

/// Record of one operation.
#[derive(Clone)]
pub enum LogItem {
    /// An entry was written into a container.
    Write {
        /// Target container.
        container: Arc<Container>,
        /// The written entry.
        entry: EntryId,
    },
    /// An entry was read under repeatable read.
    Read {
        /// The read entry.
        entry: EntryId,
    },
    /// An entry was taken from a container.
    Take {
        /// Source container.
        container: Arc<Container>,
        /// The taken entry.
        entry: EntryId,
    },
    /// A container was created.
    ContainerCreate {
        /// The new container.
        container: Arc<Container>,
    },
    /// A container was destroyed.
    ContainerDestroy {
        /// The destroyed container.
        container: Arc<Container>,
    },
    /// A container was locked.
    ContainerLock {
        /// The locked container.
        container: ContainerId,
    },
}

impl fmt::Debug for LogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write { container, entry } => {
                write!(f, "Write({} in {})", entry, container.id())
            }
            Self::Read { entry } => write!(f, "Read({entry})"),
            Self::Take { container, entry } => {
                write!(f, "Take({} from {})", entry, container.id())
            }
            Self::ContainerCreate { container } => write!(f, "ContainerCreate({})", container.id()),
            Self::ContainerDestroy { container } => {
                write!(f, "ContainerDestroy({})", container.id())
            }
            Self::ContainerLock { container } => write!(f, "ContainerLock({container})"),
        }
    }
}

impl LogItem {
    /// Returns the log this item belongs to.
    #[must_use]
    pub const fn category(&self) -> LogCategory {
        match self {
            Self::Write { .. } => LogCategory::Insert,
            Self::Read { .. } => LogCategory::Read,
            Self::Take { .. } => LogCategory::Delete,
            Self::ContainerLock { .. } => LogCategory::Lock,
            Self::ContainerCreate { .. } | Self::ContainerDestroy { .. } => LogCategory::Other,
        }
    }

    /// Hands the item's holder over to the parent transaction.
    ///
    /// # Errors
    ///
    /// Returns an internal error if `stx` does not hold the holder.
    pub fn commit_sub_transaction(
        &self,
        ctx: &LogContext<'_>,
        stx: SubTransactionId,
    ) -> CoreResult<()> {
        let iso = ctx.isolation;
        match self {
            Self::Write { entry, .. } => {
                iso.release_sub_transaction_entry_lock(EntryOperation::Write, *entry, stx)
            }
            Self::Read { entry } => {
                iso.release_sub_transaction_entry_lock(EntryOperation::Read, *entry, stx)
            }
            Self::Take { entry, .. } => {
                iso.release_sub_transaction_entry_lock(EntryOperation::Take, *entry, stx)
            }
            Self::ContainerCreate { container } => iso.release_sub_transaction_container_lock(
                ContainerOperation::Create,
                container.id(),
                stx,
            ),
            Self::ContainerDestroy { container } => iso.release_sub_transaction_container_lock(
                ContainerOperation::Destroy,
                container.id(),
                stx,
            ),
            Self::ContainerLock { container } => iso.release_sub_transaction_container_lock(
                ContainerOperation::Lock,
                *container,
                stx,
            ),
        }
    }

    /// Makes the item's effect permanent.
    ///
    /// # Errors
    ///
    /// Returns an error if a holder is missing or storage fails.
    pub fn commit_transaction(&self, ctx: &LogContext<'_>, txn: TransactionId) -> CoreResult<()> {
        let iso = ctx.isolation;
        let owner = Owner::Tx(txn);
        match self {
            Self::Write { entry, .. } => {
                iso.release_entry_lock(EntryOperation::Write, *entry, owner)
            }
            Self::Read { entry } => iso.release_entry_lock(EntryOperation::Read, *entry, owner),
            Self::Take { container, entry } => {
                container.unregister_entry(*entry, Some(txn.storage_txn()))?;
                iso.purge_entry_lock(*entry);
                Ok(())
            }
            Self::ContainerCreate { container } => {
                iso.release_container_lock(ContainerOperation::Create, container.id(), owner)
            }
            Self::ContainerDestroy { container } => drop_container(ctx, container),
            Self::ContainerLock { container } => {
                iso.release_container_lock(ContainerOperation::Lock, *container, owner)
            }
        }
    }

    /// Undoes the item inside its sub-transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a holder is missing or storage fails.
    pub fn rollback_sub_transaction(
        &self,
        ctx: &LogContext<'_>,
        stx: SubTransactionId,
    ) -> CoreResult<()> {
        self.undo(ctx, Owner::Sub(stx), stx.storage_txn())
    }

    /// Undoes the item after its sub-transaction was committed.
    ///
    /// # Errors
    ///
    /// Returns an error if a holder is missing or storage fails.
    pub fn rollback_transaction(&self, ctx: &LogContext<'_>, txn: TransactionId) -> CoreResult<()> {
        self.undo(ctx, Owner::Tx(txn), txn.storage_txn())
    }

    fn undo(&self, ctx: &LogContext<'_>, owner: Owner, storage: StorageTxn) -> CoreResult<()> {
        let iso = ctx.isolation;
        match self {
            Self::Write { container, entry } => {
                container.unregister_entry(*entry, Some(storage))?;
                iso.purge_entry_lock(*entry);
                Ok(())
            }
            Self::Read { entry } => iso.release_entry_lock(EntryOperation::Read, *entry, owner),
            Self::Take { entry, .. } => iso.release_entry_lock(EntryOperation::Take, *entry, owner),
            Self::ContainerCreate { container } => drop_container(ctx, container),
            Self::ContainerDestroy { container } => {
                iso.release_container_lock(ContainerOperation::Destroy, container.id(), owner)
            }
            Self::ContainerLock { container } => {
                iso.release_container_lock(ContainerOperation::Lock, *container, owner)
            }
        }
    }
}

/// Removes a container with its storage and every lock that refers to it.
fn drop_container(ctx: &LogContext<'_>, container: &Arc<Container>) -> CoreResult<()> {
    let id = container.id();
    ctx.containers.remove(id);
    let entries = container.destroy()?;
    for entry in &entries {
        ctx.isolation.purge_entry_lock(*entry);
    }
    ctx.isolation.purge_container_lock(id);
    debug!(container = %id, entries = entries.len(), "container dropped");
    Ok(())
}

/// Five logs of operation records.
#[derive(Debug, Default)]
pub struct OperationLog {
    buckets: [Vec<LogItem>; 5],
}

impl OperationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item to the log of its category.
    pub fn push(&mut self, item: LogItem) {
        self.buckets[item.category().index()].push(item);
    }

    /// Appends all items of `other`, keeping their order.
    pub fn merge(&mut self, other: OperationLog) {
        for (bucket, items) in self.buckets.iter_mut().zip(other.buckets) {
            bucket.extend(items);
        }
    }

    /// Returns the items of one category, oldest first.
    #[must_use]
    pub fn items(&self, category: LogCategory) -> &[LogItem] {
        &self.buckets[category.index()]
    }

    /// Returns the total number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Returns true if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Replays [`LogItem::commit_sub_transaction`] in commit order.
    ///
    /// # Errors
    ///
    /// Every item is replayed; the first failure is returned.
    pub fn commit_sub_transaction(
        &self,
        ctx: &LogContext<'_>,
        stx: SubTransactionId,
    ) -> CoreResult<()> {
        self.replay(&COMMIT_ORDER, false, |item| {
            item.commit_sub_transaction(ctx, stx)
        })
    }

    /// Replays [`LogItem::commit_transaction`] in commit order.
    ///
    /// # Errors
    ///
    /// Every item is replayed; the first failure is returned.
    pub fn commit_transaction(&self, ctx: &LogContext<'_>, txn: TransactionId) -> CoreResult<()> {
        self.replay(&COMMIT_ORDER, false, |item| item.commit_transaction(ctx, txn))
    }

    /// Replays [`LogItem::rollback_sub_transaction`] in rollback order.
    ///
    /// # Errors
    ///
    /// Every item is replayed; the first failure is returned.
    pub fn rollback_sub_transaction(
        &self,
        ctx: &LogContext<'_>,
        stx: SubTransactionId,
    ) -> CoreResult<()> {
        self.replay(&ROLLBACK_ORDER, true, |item| {
            item.rollback_sub_transaction(ctx, stx)
        })
    }

    /// Replays [`LogItem::rollback_transaction`] in rollback order.
    ///
    /// # Errors
    ///
    /// Every item is replayed; the first failure is returned.
    pub fn rollback_transaction(&self, ctx: &LogContext<'_>, txn: TransactionId) -> CoreResult<()> {
        self.replay(&ROLLBACK_ORDER, true, |item| {
            item.rollback_transaction(ctx, txn)
        })
    }

    fn replay<F>(&self, order: &[LogCategory], newest_first: bool, mut hook: F) -> CoreResult<()>
    where
        F: FnMut(&LogItem) -> CoreResult<()>,
    {
        let mut first_error = None;
        let mut run = |item: &LogItem| {
            if let Err(e) = hook(item) {
                error!(?item, error = %e, "log replay failed");
                first_error.get_or_insert(e);
            }
        };
        for category in order {
            let bucket = &self.buckets[category.index()];
            if newest_first {
                bucket.iter().rev().for_each(&mut run);
            } else {
                bucket.iter().for_each(&mut run);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
