//! Isolation manager.

use super::availability::{container_availability, entry_availability, Availability};
use super::lock::{Acquire, HolderKind, Lock, LockSnapshot, Owner};
use super::{ContainerOperation, EntryOperation};
use crate::entry::EntryId;
use crate::error::{CoreError, CoreResult};
use crate::types::{ContainerId, IsolationLevel, SubTransactionId};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Outcome of a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockResult {
    /// The holder was installed (or none was needed).
    Granted,
    /// The transaction already holds the requested slot; nothing was installed.
    AlreadyHeld,
    /// Another transaction's holder prevents the request.
    Blocked {
        /// The blocking holder.
        holder: Owner,
    },
}

impl LockResult {
    /// Returns true unless the request was blocked.
    #[must_use]
    pub const fn is_granted(self) -> bool {
        !matches!(self, Self::Blocked { .. })
    }
}

/// Table of locks keyed by item identity.
///
/// Lock handles are cloned out of the map before their mutex is taken, so
/// no shard guard is ever held while a lock is being modified.
struct LockTable<K> {
    locks: DashMap<K, Arc<Lock>>,
}

impl<K> LockTable<K>
where
    K: Eq + Hash + Copy + fmt::Display,
{
    fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn get(&self, key: &K) -> Option<Arc<Lock>> {
        self.locks.get(key).map(|lock| Arc::clone(lock.value()))
    }

    /// Installs a fresh lock with `owner` as insert holder.
    fn insert(&self, key: K, owner: Owner) -> CoreResult<()> {
        match self.locks.entry(key) {
            MapEntry::Vacant(slot) => {
                slot.insert(Arc::new(Lock::inserted(owner)));
                Ok(())
            }
            MapEntry::Occupied(_) => {
                error!(%key, %owner, "lock already exists for new item");
                Err(CoreError::internal(format!("duplicate lock key {key}")))
            }
        }
    }

    fn purge(&self, key: &K) -> bool {
        match self.locks.remove(key) {
            Some((_, lock)) => {
                lock.purge();
                true
            }
            None => false,
        }
    }

    fn release(&self, key: K, kind: HolderKind, owner: Owner) -> CoreResult<()> {
        let Some(lock) = self.get(&key) else {
            warn!(%key, %kind, %owner, "release on purged lock ignored");
            return Ok(());
        };
        if lock.release(kind, owner) {
            debug!(%key, %kind, %owner, "holder released");
            Ok(())
        } else {
            error!(%key, %kind, %owner, "release of a holder that is not held");
            Err(CoreError::internal(format!(
                "{owner} holds no {kind} holder on {key}"
            )))
        }
    }

    fn surrender(&self, key: K, kind: HolderKind, stx: SubTransactionId) -> CoreResult<()> {
        let Some(lock) = self.get(&key) else {
            warn!(%key, %kind, %stx, "surrender on purged lock ignored");
            return Ok(());
        };
        if lock.surrender(kind, stx) {
            Ok(())
        } else {
            error!(%key, %kind, %stx, "surrender of a holder that is not held");
            Err(CoreError::internal(format!(
                "{stx} holds no {kind} holder on {key}"
            )))
        }
    }

    fn snapshot(&self, key: &K) -> Option<LockSnapshot> {
        self.get(key).map(|lock| lock.snapshot())
    }

    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Acquires, releases and surrenders locks, and answers availability
/// questions for entries and containers.
///
/// The manager never waits. A conflicting request returns
/// [`LockResult::Blocked`] with the blocking holder, and the caller decides
/// whether to retry.
///
/// # Example
///
/// ```rust
/// use tuplex_core::{
///     EntryId, EntryOperation, IsolationLevel, IsolationManager, LockResult,
///     SubTransactionId, TransactionId,
/// };
///
/// let manager = IsolationManager::new();
/// let entry = EntryId::new();
/// let writer = SubTransactionId::new(TransactionId::new(1), 1);
/// let reader = SubTransactionId::new(TransactionId::new(2), 1);
///
/// manager
///     .acquire_entry_lock(EntryOperation::Write, entry, IsolationLevel::RepeatableRead, writer)
///     .unwrap();
/// let result = manager
///     .acquire_entry_lock(EntryOperation::Read, entry, IsolationLevel::RepeatableRead, reader)
///     .unwrap();
/// assert!(matches!(result, LockResult::Blocked { .. }));
/// ```
pub struct IsolationManager {
    entry_locks: LockTable<EntryId>,
    container_locks: LockTable<ContainerId>,
}

impl IsolationManager {
    /// Creates a manager without locks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entry_locks: LockTable::new(),
            container_locks: LockTable::new(),
        }
    }

    /// Requests the holder `op` needs on `entry` for `stx`.
    ///
    /// - `Write` installs a new lock with `stx` as insert holder.
    /// - `Read` under read committed is granted without a lock.
    /// - `Read` under repeatable read adds a read holder.
    /// - `Take` sets the delete holder.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidEntry`] if the entry has no lock (it is gone)
    ///   or the transaction already removes it.
    /// - [`CoreError::Internal`] if a lock already exists for a written entry.
    pub fn acquire_entry_lock(
        &self,
        op: EntryOperation,
        entry: EntryId,
        level: IsolationLevel,
        stx: SubTransactionId,
    ) -> CoreResult<LockResult> {
        let owner = Owner::Sub(stx);
        if op == EntryOperation::Write {
            self.entry_locks.insert(entry, owner)?;
            debug!(%entry, %owner, "entry insert lock installed");
            return Ok(LockResult::Granted);
        }
        if op == EntryOperation::Read && level == IsolationLevel::ReadCommitted {
            return Ok(LockResult::Granted);
        }
        let lock = self
            .entry_locks
            .get(&entry)
            .ok_or(CoreError::InvalidEntry { entry })?;
        let outcome = match op {
            EntryOperation::Read => lock.try_add_reader(owner),
            _ => lock.try_set_delete(owner),
        };
        match outcome {
            Acquire::Granted => {
                debug!(%entry, %owner, %op, "entry lock granted");
                Ok(LockResult::Granted)
            }
            Acquire::AlreadyHeld => Ok(LockResult::AlreadyHeld),
            Acquire::Blocked(holder) => {
                debug!(%entry, %owner, %op, %holder, "entry lock blocked");
                Ok(LockResult::Blocked { holder })
            }
            Acquire::Gone => Err(CoreError::InvalidEntry { entry }),
        }
    }

    /// Requests the holder `op` needs on `container` for `stx`.
    ///
    /// `Create` installs a new lock, `Destroy` sets the delete holder and
    /// `Lock` sets the exclusive holder.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidContainer`] if the container has no lock or the
    ///   transaction already destroys it.
    /// - [`CoreError::Internal`] for a duplicate create or an entry-level operation.
    pub fn acquire_container_lock(
        &self,
        op: ContainerOperation,
        container: ContainerId,
        _level: IsolationLevel,
        stx: SubTransactionId,
    ) -> CoreResult<LockResult> {
        let owner = Owner::Sub(stx);
        let kind = op.holder_kind()?;
        if kind == HolderKind::Insert {
            self.container_locks.insert(container, owner)?;
            debug!(%container, %owner, "container create lock installed");
            return Ok(LockResult::Granted);
        }
        let lock = self
            .container_locks
            .get(&container)
            .ok_or(CoreError::InvalidContainer { container })?;
        let outcome = if kind == HolderKind::Delete {
            lock.try_set_delete(owner)
        } else {
            lock.try_set_exclusive(owner)
        };
        match outcome {
            Acquire::Granted => {
                debug!(%container, %owner, ?op, "container lock granted");
                Ok(LockResult::Granted)
            }
            Acquire::AlreadyHeld => Ok(LockResult::AlreadyHeld),
            Acquire::Blocked(holder) => {
                debug!(%container, %owner, ?op, %holder, "container lock blocked");
                Ok(LockResult::Blocked { holder })
            }
            Acquire::Gone => Err(CoreError::InvalidContainer { container }),
        }
    }

    /// Removes `owner`'s holder for `op` from the entry's lock.
    ///
    /// A missing lock is ignored: a committed take purged it already.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Internal`] if the lock exists but `owner` holds
    /// no such holder.
    pub fn release_entry_lock(
        &self,
        op: EntryOperation,
        entry: EntryId,
        owner: Owner,
    ) -> CoreResult<()> {
        self.entry_locks.release(entry, op.holder_kind(), owner)
    }

    /// Removes `owner`'s holder for `op` from the container's lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Internal`] if the lock exists but `owner` holds
    /// no such holder, or if `op` never holds a container lock.
    pub fn release_container_lock(
        &self,
        op: ContainerOperation,
        container: ContainerId,
        owner: Owner,
    ) -> CoreResult<()> {
        self.container_locks.release(container, op.holder_kind()?, owner)
    }

    /// Surrenders `stx`'s entry holder for `op` to its transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Internal`] if the lock exists but `stx` holds no
    /// such holder.
    pub fn release_sub_transaction_entry_lock(
        &self,
        op: EntryOperation,
        entry: EntryId,
        stx: SubTransactionId,
    ) -> CoreResult<()> {
        self.entry_locks.surrender(entry, op.holder_kind(), stx)
    }

    /// Surrenders `stx`'s container holder for `op` to its transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Internal`] if the lock exists but `stx` holds no
    /// such holder.
    pub fn release_sub_transaction_container_lock(
        &self,
        op: ContainerOperation,
        container: ContainerId,
        stx: SubTransactionId,
    ) -> CoreResult<()> {
        self.container_locks.surrender(container, op.holder_kind()?, stx)
    }

    /// Drops the lock of an entry that no longer exists.
    pub fn purge_entry_lock(&self, entry: EntryId) -> bool {
        let purged = self.entry_locks.purge(&entry);
        if purged {
            debug!(%entry, "entry lock purged");
        }
        purged
    }

    /// Drops the lock of a container that no longer exists.
    pub fn purge_container_lock(&self, container: ContainerId) -> bool {
        let purged = self.container_locks.purge(&container);
        if purged {
            debug!(%container, "container lock purged");
        }
        purged
    }

    /// Decides whether `entry` may be used for `op` by `stx`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Internal`] for `EntryOperation::Write`, which has
    /// no availability rule.
    pub fn check_entry_availability(
        &self,
        op: EntryOperation,
        entry: EntryId,
        level: IsolationLevel,
        stx: SubTransactionId,
    ) -> CoreResult<Availability> {
        let snapshot = self.entry_locks.snapshot(&entry);
        entry_availability(snapshot.as_ref(), op, level, stx.transaction())
    }

    /// Decides whether `container` may be used for `op` by `stx`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Internal`] for `ContainerOperation::Create`, which
    /// has no availability rule.
    pub fn check_container_availability(
        &self,
        op: ContainerOperation,
        container: ContainerId,
        level: IsolationLevel,
        stx: SubTransactionId,
    ) -> CoreResult<Availability> {
        let snapshot = self.container_locks.snapshot(&container);
        container_availability(snapshot.as_ref(), op, level, stx.transaction())
    }

    /// Returns true if `overwrite` replaces `base` within the unit of work
    /// that removes `base`.
    ///
    /// That is the case when the holder deleting `base` covers the holder
    /// that inserted `overwrite`: the same sub-transaction, or the surrendered
    /// transaction of it.
    #[must_use]
    pub fn check_valid_entry_overwrite(&self, base: EntryId, overwrite: EntryId) -> bool {
        let (Some(base), Some(overwrite)) = (
            self.entry_locks.snapshot(&base),
            self.entry_locks.snapshot(&overwrite),
        ) else {
            return false;
        };
        match (base.delete, overwrite.insert) {
            (Some(deleter), Some(inserter)) => deleter.covers(inserter),
            _ => false,
        }
    }

    /// Returns the holders of an entry's lock.
    #[must_use]
    pub fn entry_lock_snapshot(&self, entry: EntryId) -> Option<LockSnapshot> {
        self.entry_locks.snapshot(&entry)
    }

    /// Returns the holders of a container's lock.
    #[must_use]
    pub fn container_lock_snapshot(&self, container: ContainerId) -> Option<LockSnapshot> {
        self.container_locks.snapshot(&container)
    }

    /// Number of live entry locks.
    #[must_use]
    pub fn entry_lock_count(&self) -> usize {
        self.entry_locks.len()
    }

    /// Number of live container locks.
    #[must_use]
    pub fn container_lock_count(&self) -> usize {
        self.container_locks.len()
    }
}

impl Default for IsolationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IsolationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolationManager")
            .field("entry_locks", &self.entry_lock_count())
            .field("container_locks", &self.container_lock_count())
            .finish()
    }
}
