//! The space: containers, transactions and entry operations.
//!
//! Every operation of a [`SpaceTxn`] runs in its own sub-transaction. The
//! sub-transaction commits when the operation succeeds, surrendering its
//! holders to the transaction, and rolls back when it fails, so a failed
//! operation leaves no trace while the transaction itself stays usable.
//!
//! Nothing here ever waits. A held lock surfaces as
//! [`CoreError::EntryLocked`] or [`CoreError::ContainerLocked`], and the
//! caller decides whether to retry.

use crate::access::{AccessPolicy, AllowAll};
use crate::config::{ContainerConfig, SpaceConfig};
use crate::container::{Container, ContainerRegistry};
use crate::coordinator::{CoordinationData, CoordinatorEnv};
use crate::entry::{Entry, EntryId};
use crate::error::{CoreError, CoreResult, CountShortfall};
use crate::isolation::{
    Availability, ContainerOperation, EntryOperation, IsolationManager, LockResult,
};
use crate::query::{PredicateEngine, QueryEngine};
use crate::selector::{Count, SelectionContext, Selector};
use crate::stats::{SpaceStats, StatsSnapshot};
use crate::transaction::{
    LogContext, LogItem, SubTransaction, Transaction, TransactionManager, TransactionStatus,
};
use crate::types::{ContainerId, IsolationLevel, TransactionId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};
use tuplex_storage::MapCatalog;

/// A transactional tuple space.
///
/// # Example
///
/// ```rust
/// use tuplex_core::{ContainerConfig, Count, Entry, Selector, Space};
///
/// let space = Space::default();
/// let jobs = space.create_container(ContainerConfig::named("jobs")).unwrap();
///
/// space
///     .transaction(|tx| {
///         tx.write(jobs, Entry::new("compile"))?;
///         tx.write(jobs, Entry::new("test"))?;
///         Ok(())
///     })
///     .unwrap();
///
/// let taken = space.take(jobs, &[Selector::fifo(Count::Exact(1))]).unwrap();
/// assert_eq!(taken[0].value().as_text(), Some("compile"));
/// ```
pub struct Space {
    config: SpaceConfig,
    isolation: IsolationManager,
    containers: ContainerRegistry,
    transactions: TransactionManager,
    catalog: Arc<MapCatalog>,
    engine: Arc<dyn QueryEngine>,
    access: Arc<dyn AccessPolicy>,
    stats: SpaceStats,
}

impl Space {
    /// Creates an empty space.
    #[must_use]
    pub fn new(config: SpaceConfig) -> Self {
        Self {
            config,
            isolation: IsolationManager::new(),
            containers: ContainerRegistry::new(),
            transactions: TransactionManager::new(),
            catalog: Arc::new(MapCatalog::new()),
            engine: Arc::new(PredicateEngine),
            access: Arc::new(AllowAll),
            stats: SpaceStats::new(),
        }
    }

    /// Replaces the engine query coordinators evaluate queries with.
    ///
    /// Containers created afterwards use the new engine.
    #[must_use]
    pub fn with_query_engine(mut self, engine: impl QueryEngine + 'static) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    /// Replaces the access policy consulted on every selected entry.
    #[must_use]
    pub fn with_access_policy(mut self, policy: impl AccessPolicy + 'static) -> Self {
        self.access = Arc::new(policy);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    /// Returns the isolation manager.
    #[must_use]
    pub fn isolation(&self) -> &IsolationManager {
        &self.isolation
    }

    /// Returns the catalog of live stored maps.
    #[must_use]
    pub fn catalog(&self) -> &MapCatalog {
        &self.catalog
    }

    /// Returns a container regardless of its visibility.
    #[must_use]
    pub fn container(&self, id: ContainerId) -> Option<Arc<Container>> {
        self.containers.get(id)
    }

    /// Returns the number of containers, pending ones included.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    /// Returns the number of running transactions.
    #[must_use]
    pub fn active_transactions(&self) -> usize {
        self.transactions.active_count()
    }

    /// Returns a snapshot of the statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Begins a transaction at the default isolation level.
    pub fn begin(&self) -> SpaceTxn<'_> {
        self.begin_with(self.config.default_isolation)
    }

    /// Begins a transaction at `level`.
    pub fn begin_with(&self, level: IsolationLevel) -> SpaceTxn<'_> {
        let txn = self.transactions.begin(level);
        self.record(SpaceStats::record_transaction_start);
        SpaceTxn { space: self, txn }
    }

    /// Executes a function within a transaction.
    ///
    /// If the function returns `Ok`, the transaction is committed.
    /// If it returns `Err`, the transaction is rolled back.
    ///
    /// # Errors
    ///
    /// The function's error, or the commit error.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&SpaceTxn<'_>) -> CoreResult<T>,
    {
        let tx = self.begin();
        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                // Roll back, but report the original error unless undo broke an invariant
                Err(after_rollback(e, tx.rollback()))
            }
        }
    }

    /// Creates a container in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::create_container`].
    pub fn create_container(&self, config: ContainerConfig) -> CoreResult<ContainerId> {
        self.transaction(|tx| tx.create_container(config))
    }

    /// Destroys a container in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::destroy_container`].
    pub fn destroy_container(&self, container: ContainerId) -> CoreResult<()> {
        self.transaction(|tx| tx.destroy_container(container))
    }

    /// Resolves a container name in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::lookup_container`].
    pub fn lookup_container(&self, name: &str) -> CoreResult<ContainerId> {
        self.transaction(|tx| tx.lookup_container(name))
    }

    /// Writes an entry in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::write`].
    pub fn write(&self, container: ContainerId, entry: Entry) -> CoreResult<EntryId> {
        self.transaction(|tx| tx.write(container, entry))
    }

    /// Writes an entry with coordination data in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::write_with`].
    pub fn write_with(
        &self,
        container: ContainerId,
        entry: Entry,
        data: &[CoordinationData],
    ) -> CoreResult<EntryId> {
        self.transaction(|tx| tx.write_with(container, entry, data))
    }

    /// Reads entries in their own transaction.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::read`].
    pub fn read(&self, container: ContainerId, selectors: &[Selector]) -> CoreResult<Vec<Entry>> {
        self.transaction(|tx| tx.read(container, selectors))
    }

    /// Takes entries in their own transaction.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::take`].
    pub fn take(&self, container: ContainerId, selectors: &[Selector]) -> CoreResult<Vec<Entry>> {
        self.transaction(|tx| tx.take(container, selectors))
    }

    /// Deletes entries in their own transaction.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::delete`].
    pub fn delete(&self, container: ContainerId, selectors: &[Selector]) -> CoreResult<usize> {
        self.transaction(|tx| tx.delete(container, selectors))
    }

    fn log_context(&self) -> LogContext<'_> {
        LogContext {
            isolation: &self.isolation,
            containers: &self.containers,
        }
    }

    fn record(&self, f: impl FnOnce(&SpaceStats)) {
        if self.config.record_stats {
            f(&self.stats);
        }
    }

    fn record_failure(&self, error: &CoreError) {
        self.record(|stats| {
            stats.record_error();
            if matches!(
                error,
                CoreError::EntryLocked { .. } | CoreError::ContainerLocked { .. }
            ) {
                stats.record_lock_conflict();
            }
        });
    }
}

impl Default for Space {
    fn default() -> Self {
        Self::new(SpaceConfig::default())
    }
}

impl fmt::Debug for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Space")
            .field("containers", &self.containers.len())
            .field("active_transactions", &self.transactions.active_count())
            .field("entry_locks", &self.isolation.entry_lock_count())
            .finish_non_exhaustive()
    }
}

/// A running transaction of a [`Space`].
///
/// Dropping a transaction that was neither committed nor rolled back rolls
/// it back.
pub struct SpaceTxn<'s> {
    space: &'s Space,
    txn: Arc<Transaction>,
}

impl SpaceTxn<'_> {
    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.txn.id()
    }

    /// Returns the isolation level.
    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.txn.isolation_level()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.txn.status()
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// See [`Transaction::commit`].
    pub fn commit(self) -> CoreResult<()> {
        let result = self
            .space
            .transactions
            .commit(&self.txn, &self.space.log_context());
        if self.txn.status() == TransactionStatus::Committed {
            self.space.record(SpaceStats::record_transaction_commit);
        }
        result
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// See [`Transaction::rollback`].
    pub fn rollback(self) -> CoreResult<()> {
        self.abort()
    }

    fn abort(&self) -> CoreResult<()> {
        let result = self
            .space
            .transactions
            .rollback(&self.txn, &self.space.log_context());
        if self.txn.status() == TransactionStatus::Aborted {
            self.space.record(SpaceStats::record_transaction_abort);
        }
        result
    }

    /// Creates a container.
    ///
    /// The container stays invisible to other transactions until this one
    /// commits. Unset configuration falls back to the space defaults.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ContainerNameTaken`] if a live container has the name.
    /// - [`CoreError::InvalidOperation`] for duplicate coordinator names.
    pub fn create_container(&self, config: ContainerConfig) -> CoreResult<ContainerId> {
        let space = self.space;
        self.run(|stx| {
            let id = space.containers.allocate_id();
            let coordinators = if config.coordinators.is_empty() {
                &space.config.default_coordinators
            } else {
                &config.coordinators
            };
            let env = CoordinatorEnv {
                catalog: &space.catalog,
                engine: &space.engine,
                seed: space.config.random_seed,
            };
            let container = Arc::new(Container::build(
                id,
                config.name.clone(),
                config.max_size.or(space.config.default_max_size),
                coordinators,
                &env,
            )?);

            space.isolation.acquire_container_lock(
                ContainerOperation::Create,
                id,
                self.isolation_level(),
                stx.id(),
            )?;
            stx.log(LogItem::ContainerCreate {
                container: Arc::clone(&container),
            })?;
            space.containers.insert(container)?;
            space.record(SpaceStats::record_container_created);
            debug!(container = %id, name = ?config.name, "container created");
            Ok(id)
        })
    }

    /// Destroys a container when the transaction commits.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidContainer`] if the container is not visible.
    /// - [`CoreError::ContainerLocked`] if another transaction uses it.
    pub fn destroy_container(&self, container: ContainerId) -> CoreResult<()> {
        self.run(|stx| {
            let handle = self.open(stx, container, ContainerOperation::Destroy)?;
            match self.space.isolation.acquire_container_lock(
                ContainerOperation::Destroy,
                container,
                self.isolation_level(),
                stx.id(),
            )? {
                LockResult::Granted => {
                    stx.log(LogItem::ContainerDestroy { container: handle })?;
                    self.space.record(SpaceStats::record_container_destroyed);
                    Ok(())
                }
                LockResult::AlreadyHeld => Ok(()),
                LockResult::Blocked { holder } => {
                    Err(CoreError::ContainerLocked { container, holder })
                }
            }
        })
    }

    /// Locks a container exclusively until the transaction ends.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidContainer`] if the container is not visible.
    /// - [`CoreError::ContainerLocked`] if another transaction uses it.
    pub fn lock_container(&self, container: ContainerId) -> CoreResult<()> {
        self.run(|stx| {
            self.open(stx, container, ContainerOperation::Lock)?;
            match self.space.isolation.acquire_container_lock(
                ContainerOperation::Lock,
                container,
                self.isolation_level(),
                stx.id(),
            )? {
                LockResult::Granted => stx.log(LogItem::ContainerLock { container }),
                LockResult::AlreadyHeld => Ok(()),
                LockResult::Blocked { holder } => {
                    Err(CoreError::ContainerLocked { container, holder })
                }
            }
        })
    }

    /// Resolves a container name.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ContainerNotFound`] if no visible container has the name.
    /// - [`CoreError::ContainerLocked`] if another transaction locked it.
    pub fn lookup_container(&self, name: &str) -> CoreResult<ContainerId> {
        self.run(|stx| {
            let not_found = || CoreError::ContainerNotFound {
                name: name.to_string(),
            };
            let id = self.space.containers.lookup(name).ok_or_else(not_found)?;
            match self.open(stx, id, ContainerOperation::Read) {
                Ok(_) => Ok(id),
                Err(CoreError::InvalidContainer { .. }) => Err(not_found()),
                Err(e) => Err(e),
            }
        })
    }

    /// Writes an entry.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::write_with`].
    pub fn write(&self, container: ContainerId, entry: Entry) -> CoreResult<EntryId> {
        self.write_with(container, entry, &[])
    }

    /// Writes an entry, passing `data` to the container's coordinators.
    ///
    /// The entry stays invisible to other transactions until this one
    /// commits.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidContainer`] or [`CoreError::ContainerLocked`]
    ///   if the container cannot be written to.
    /// - Coordinator rejections such as [`CoreError::DuplicateKey`].
    pub fn write_with(
        &self,
        container: ContainerId,
        entry: Entry,
        data: &[CoordinationData],
    ) -> CoreResult<EntryId> {
        self.run(|stx| {
            let handle = self.open(stx, container, ContainerOperation::Write)?;
            self.write_entry(stx, &handle, &entry, data)
        })
    }

    /// Writes several entries in one sub-transaction: all or none.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::write_with`].
    pub fn write_all<I>(&self, container: ContainerId, entries: I) -> CoreResult<Vec<EntryId>>
    where
        I: IntoIterator<Item = Entry>,
    {
        self.run(|stx| {
            let handle = self.open(stx, container, ContainerOperation::Write)?;
            entries
                .into_iter()
                .map(|entry| self.write_entry(stx, &handle, &entry, &[]))
                .collect()
        })
    }

    /// Reads the entries `selectors` pick.
    ///
    /// Under repeatable read the entries stay read-locked until the
    /// transaction ends.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::take`].
    pub fn read(&self, container: ContainerId, selectors: &[Selector]) -> CoreResult<Vec<Entry>> {
        self.select(container, selectors, EntryOperation::Read)
    }

    /// Removes and returns the entries `selectors` pick.
    ///
    /// The entries disappear for other transactions when this one commits.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidContainer`] or [`CoreError::ContainerLocked`]
    ///   if the container cannot be used.
    /// - [`CoreError::CountNotMet`], [`CoreError::EntryLocked`] or
    ///   [`CoreError::AccessDenied`] when the count cannot be honoured.
    /// - [`CoreError::UnknownCoordinator`] or [`CoreError::UnsupportedSelector`]
    ///   for selectors the container cannot run.
    pub fn take(&self, container: ContainerId, selectors: &[Selector]) -> CoreResult<Vec<Entry>> {
        self.select(container, selectors, EntryOperation::Take)
    }

    /// Removes the entries `selectors` pick and returns how many.
    ///
    /// # Errors
    ///
    /// See [`SpaceTxn::take`].
    pub fn delete(&self, container: ContainerId, selectors: &[Selector]) -> CoreResult<usize> {
        self.take(container, selectors).map(|entries| entries.len())
    }

    /// Runs `op` in a fresh sub-transaction.
    fn run<T>(&self, op: impl FnOnce(&SubTransaction) -> CoreResult<T>) -> CoreResult<T> {
        let stx = self.txn.begin_sub_transaction()?;
        let ctx = self.space.log_context();
        match op(&stx) {
            Ok(result) => {
                stx.commit(&ctx)?;
                Ok(result)
            }
            Err(e) => {
                let undone = stx.rollback(&ctx);
                debug!(stx = %stx.id(), error = %e, "operation failed");
                self.space.record_failure(&e);
                Err(after_rollback(e, undone))
            }
        }
    }

    /// Checks the container is usable for `op` and returns it.
    fn open(
        &self,
        stx: &SubTransaction,
        container: ContainerId,
        op: ContainerOperation,
    ) -> CoreResult<Arc<Container>> {
        match self.space.isolation.check_container_availability(
            op,
            container,
            self.isolation_level(),
            stx.id(),
        )? {
            Availability::Available => self
                .space
                .containers
                .get(container)
                .ok_or(CoreError::InvalidContainer { container }),
            Availability::NotVisible => Err(CoreError::InvalidContainer { container }),
            Availability::NotAvailable { holder } => {
                Err(CoreError::ContainerLocked { container, holder })
            }
        }
    }

    fn write_entry(
        &self,
        stx: &SubTransaction,
        container: &Arc<Container>,
        entry: &Entry,
        data: &[CoordinationData],
    ) -> CoreResult<EntryId> {
        let id = entry.id();
        self.space.isolation.acquire_entry_lock(
            EntryOperation::Write,
            id,
            self.isolation_level(),
            stx.id(),
        )?;
        stx.log(LogItem::Write {
            container: Arc::clone(container),
            entry: id,
        })?;
        container.register_entry(stx.id(), data, entry, &self.space.isolation)?;
        self.space.record(|stats| stats.record_writes(1));
        Ok(id)
    }

    fn select(
        &self,
        container: ContainerId,
        selectors: &[Selector],
        op: EntryOperation,
    ) -> CoreResult<Vec<Entry>> {
        self.run(|stx| {
            let handle = self.open(stx, container, op.into())?;
            let ctx = SelectionContext {
                isolation: &self.space.isolation,
                access: &*self.space.access,
                container,
                operation: op,
                level: self.isolation_level(),
                stx: stx.id(),
            };
            let mut chain = handle.selector_chain(selectors)?;
            let count = chain.count();
            let selected = chain.get_all(&ctx)?;
            let entries = self.lock_selected(stx, &handle, op, count, selected)?;

            let n = entries.len() as u64;
            match op {
                EntryOperation::Read => self.space.record(|stats| stats.record_reads(n)),
                _ => self.space.record(|stats| stats.record_takes(n)),
            }
            Ok(entries)
        })
    }

    /// Acquires the holders `op` needs on the selected entries.
    ///
    /// Selection and locking are separate steps, so an entry can be taken
    /// or locked by someone else in between. Count semantics decide whether
    /// that fails the operation.
    fn lock_selected(
        &self,
        stx: &SubTransaction,
        container: &Arc<Container>,
        op: EntryOperation,
        count: Count,
        selected: Vec<Entry>,
    ) -> CoreResult<Vec<Entry>> {
        let level = self.isolation_level();
        let read_committed = op == EntryOperation::Read && level == IsolationLevel::ReadCommitted;
        let mut locked = Vec::with_capacity(selected.len());

        for entry in selected {
            if read_committed {
                locked.push(entry);
                continue;
            }
            let id = entry.id();
            match self.space.isolation.acquire_entry_lock(op, id, level, stx.id()) {
                Ok(LockResult::Granted) => {
                    stx.log(match op {
                        EntryOperation::Read => LogItem::Read { entry: id },
                        _ => LogItem::Take {
                            container: Arc::clone(container),
                            entry: id,
                        },
                    })?;
                    locked.push(entry);
                }
                Ok(LockResult::AlreadyHeld) => locked.push(entry),
                Ok(LockResult::Blocked { .. }) if count == Count::Max => {
                    debug!(entry = %id, "entry locked after selection, skipped");
                }
                Ok(LockResult::Blocked { holder }) => {
                    return Err(CoreError::EntryLocked { entry: id, holder });
                }
                Err(CoreError::InvalidEntry { .. }) if count == Count::All => {
                    return Err(CoreError::CountNotMet {
                        requested: count,
                        available: locked.len(),
                        shortfall: CountShortfall::AllOrNothing,
                    });
                }
                Err(CoreError::InvalidEntry { .. }) => {
                    debug!(entry = %id, "entry vanished after selection, skipped");
                }
                Err(e) => return Err(e),
            }
        }

        if let Count::Exact(n) = count {
            if locked.len() < n {
                return Err(CoreError::CountNotMet {
                    requested: count,
                    available: locked.len(),
                    shortfall: CountShortfall::HardCount,
                });
            }
        }
        Ok(locked)
    }
}

/// Chooses the error reported for a failed operation once its rollback ran.
///
/// An internal error from the rollback replaces `original`: the lock table
/// no longer matches the log and the caller must not retry.
fn after_rollback(original: CoreError, undone: CoreResult<()>) -> CoreError {
    match undone {
        Ok(()) => original,
        Err(undo) if undo.is_internal() => {
            error!(error = %undo, %original, "rollback hit an internal error");
            undo
        }
        Err(undo) => {
            warn!(error = %undo, %original, "rollback failed");
            original
        }
    }
}

impl Drop for SpaceTxn<'_> {
    fn drop(&mut self) {
        if self.txn.is_running() {
            debug!(txn = %self.txn.id(), "unfinished transaction rolled back on drop");
            if let Err(e) = self.abort() {
                warn!(txn = %self.txn.id(), error = %e, "implicit rollback failed");
            }
        }
    }
}

impl fmt::Debug for SpaceTxn<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpaceTxn")
            .field("id", &self.txn.id())
            .field("level", &self.txn.isolation_level())
            .field("status", &self.txn.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorConfig;
    use crate::entry::{EntryType, Value};
    use crate::isolation::Owner;
    use crate::query::Query;

    fn space() -> Space {
        Space::new(SpaceConfig::new().random_seed(5))
    }

    fn fifo(space: &Space) -> ContainerId {
        space
            .create_container(ContainerConfig::new().coordinator(CoordinatorConfig::fifo()))
            .unwrap()
    }

    #[test]
    fn pending_writes_are_private() {
        let space = space();
        let c = fifo(&space);
        let writer = space.begin();
        writer.write(c, Entry::new(1)).unwrap();

        let reader = space.begin_with(IsolationLevel::ReadCommitted);
        let seen = reader.read(c, &[Selector::fifo(Count::Max)]).unwrap();
        assert!(seen.is_empty());
        assert_eq!(writer.read(c, &[Selector::fifo(Count::Max)]).unwrap().len(), 1);

        writer.commit().unwrap();
        assert_eq!(reader.read(c, &[Selector::fifo(Count::Max)]).unwrap().len(), 1);
        reader.commit().unwrap();
    }

    #[test]
    fn closure_rollback_surfaces_internal_error() {
        let space = space();
        let c = fifo(&space);
        let id = space.write(c, Entry::new(1)).unwrap();

        let err = space
            .transaction(|tx| {
                tx.read(c, &[Selector::fifo(Count::Exact(1))])?;
                // The read holder vanishes behind the log's back.
                space
                    .isolation()
                    .release_entry_lock(EntryOperation::Read, id, Owner::Tx(tx.id()))?;
                Err::<(), _>(CoreError::invalid_operation("give up"))
            })
            .unwrap_err();
        assert!(err.is_internal(), "unexpected {err:?}");
    }

    #[test]
    fn rollback_errors_are_ranked() {
        let op = || CoreError::invalid_operation("op");
        assert!(matches!(
            after_rollback(op(), Ok(())),
            CoreError::InvalidOperation { .. }
        ));
        assert!(matches!(
            after_rollback(op(), Err(CoreError::invalid_operation("undo"))),
            CoreError::InvalidOperation { ref message } if message == "op"
        ));
        assert!(after_rollback(op(), Err(CoreError::internal("lost holder"))).is_internal());
    }

    #[test]
    fn take_is_undone_by_rollback() {
        let space = space();
        let c = fifo(&space);
        space.write(c, Entry::new(1)).unwrap();

        let tx = space.begin();
        assert_eq!(tx.take(c, &[Selector::fifo(Count::Exact(1))]).unwrap().len(), 1);
        assert!(tx.take(c, &[Selector::fifo(Count::Exact(1))]).is_err());
        tx.rollback().unwrap();

        assert_eq!(space.read(c, &[Selector::fifo(Count::Max)]).unwrap().len(), 1);
    }

    #[test]
    fn failed_operation_keeps_transaction_usable() {
        let space = space();
        let c = fifo(&space);
        let tx = space.begin();
        tx.write(c, Entry::new(1)).unwrap();

        let result = tx.take(c, &[Selector::fifo(Count::Exact(3))]);
        assert!(matches!(result, Err(CoreError::CountNotMet { .. })));
        assert_eq!(tx.status(), TransactionStatus::Running);

        tx.write(c, Entry::new(2)).unwrap();
        tx.commit().unwrap();
        assert_eq!(space.delete(c, &[Selector::fifo(Count::All)]).unwrap(), 2);
    }

    #[test]
    fn conflicting_take_reports_holder() {
        let space = space();
        let c = fifo(&space);
        space.write(c, Entry::new(1)).unwrap();

        let first = space.begin();
        first.take(c, &[Selector::fifo(Count::Exact(1))]).unwrap();

        let second = space.begin();
        let result = second.take(c, &[Selector::fifo(Count::All)]);
        match result {
            Err(CoreError::EntryLocked { holder, .. }) => {
                assert_eq!(holder.transaction(), first.id());
            }
            other => panic!("expected EntryLocked, got {other:?}"),
        }
        assert_eq!(space.stats().lock_conflicts, 1);
    }

    #[test]
    fn container_lifecycle() {
        let space = space();
        let tx = space.begin();
        let c = tx.create_container(ContainerConfig::named("jobs")).unwrap();
        assert_eq!(tx.lookup_container("jobs").unwrap(), c);
        assert!(matches!(
            space.lookup_container("jobs"),
            Err(CoreError::ContainerNotFound { .. })
        ));
        tx.commit().unwrap();
        assert_eq!(space.lookup_container("jobs").unwrap(), c);

        space.write(c, Entry::new("x")).unwrap();
        space.destroy_container(c).unwrap();
        assert!(space.container(c).is_none());
        assert!(space.catalog().is_empty());
        assert_eq!(space.isolation().entry_lock_count(), 0);
        assert!(matches!(
            space.write(c, Entry::new("y")),
            Err(CoreError::InvalidContainer { .. })
        ));
    }

    #[test]
    fn rolled_back_create_leaves_nothing() {
        let space = space();
        let tx = space.begin();
        let c = tx.create_container(ContainerConfig::named("tmp")).unwrap();
        tx.write(c, Entry::new(1)).unwrap();
        tx.rollback().unwrap();

        assert_eq!(space.container_count(), 0);
        assert!(space.catalog().is_empty());
        assert_eq!(space.isolation().container_lock_count(), 0);
        assert_eq!(space.isolation().entry_lock_count(), 0);
    }

    #[test]
    fn locked_container_rejects_other_transactions() {
        let space = space();
        let c = fifo(&space);
        let owner = space.begin();
        owner.lock_container(c).unwrap();
        owner.lock_container(c).unwrap();

        assert!(matches!(
            space.write(c, Entry::new(1)),
            Err(CoreError::ContainerLocked { .. })
        ));
        owner.write(c, Entry::new(1)).unwrap();
        owner.commit().unwrap();
        space.write(c, Entry::new(2)).unwrap();
    }

    #[test]
    fn drop_rolls_back() {
        let space = space();
        let c = fifo(&space);
        {
            let tx = space.begin();
            tx.write(c, Entry::new(1)).unwrap();
        }
        assert_eq!(space.active_transactions(), 0);
        assert!(space.read(c, &[Selector::fifo(Count::Max)]).unwrap().is_empty());
        assert_eq!(space.stats().transactions_aborted, 1);
    }

    #[test]
    fn access_policy_filters_selection() {
        let secret = EntryType::new("secret");
        let space = space().with_access_policy(move |req: &crate::access::AccessRequest<'_>| {
            req.entry.entry_type().name() != "secret"
        });
        let c = fifo(&space);
        space.write(c, Entry::new(1)).unwrap();
        space.write(c, Entry::typed(secret, 2)).unwrap();

        assert_eq!(space.read(c, &[Selector::fifo(Count::Max)]).unwrap().len(), 1);
        assert!(matches!(
            space.read(c, &[Selector::fifo(Count::All)]),
            Err(CoreError::AccessDenied { .. })
        ));
    }

    #[test]
    fn write_all_is_atomic() {
        let space = space();
        let c = space
            .create_container(
                ContainerConfig::new()
                    .coordinator(CoordinatorConfig::fifo())
                    .max_size(2),
            )
            .unwrap();
        let result = space.transaction(|tx| tx.write_all(c, (0..3).map(Entry::new)));
        assert!(matches!(result, Err(CoreError::ContainerFull { .. })));
        assert_eq!(space.container(c).unwrap().len().unwrap(), 0);
    }

    #[test]
    fn query_selection_through_space() {
        let space = space();
        let c = space
            .create_container(
                ContainerConfig::new()
                    .coordinator(CoordinatorConfig::fifo())
                    .coordinator(CoordinatorConfig::query(["price"])),
            )
            .unwrap();
        for price in [5, 15, 25] {
            space
                .write(c, Entry::new(Value::map([("price", Value::from(price))])))
                .unwrap();
        }
        let cheap = space
            .read(c, &[Selector::query(Query::lt("price", 20), Count::Max)])
            .unwrap();
        assert_eq!(cheap.len(), 2);
    }
}
