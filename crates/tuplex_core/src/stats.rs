//! Space statistics.
//!
//! # Usage
//!
//! ```rust
//! use tuplex_core::{ContainerConfig, Entry, Space};
//!
//! let space = Space::default();
//! let jobs = space.create_container(ContainerConfig::named("jobs")).unwrap();
//! space.write(jobs, Entry::new("job-1")).unwrap();
//!
//! let stats = space.stats();
//! assert_eq!(stats.writes, 1);
//! assert_eq!(stats.containers_created, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Space statistics.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct SpaceStats {
    // Entry counters
    /// Entries written.
    writes: AtomicU64,
    /// Entries read.
    reads: AtomicU64,
    /// Entries taken or deleted.
    takes: AtomicU64,

    // Container counters
    /// Containers created.
    containers_created: AtomicU64,
    /// Containers destroyed.
    containers_destroyed: AtomicU64,

    // Transaction counters
    /// Transactions started.
    transactions_started: AtomicU64,
    /// Transactions committed.
    transactions_committed: AtomicU64,
    /// Transactions aborted.
    transactions_aborted: AtomicU64,

    // Error counters
    /// Operations that failed on a held lock.
    lock_conflicts: AtomicU64,
    /// Failed operations.
    errors: AtomicU64,
}

impl SpaceStats {
    /// Creates zeroed stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_writes(&self, count: u64) {
        self.writes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_reads(&self, count: u64) {
        self.reads.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_takes(&self, count: u64) {
        self.takes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_container_created(&self) {
        self.containers_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_container_destroyed(&self) {
        self.containers_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_conflict(&self) {
        self.lock_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods (public API) ===

    /// Returns the number of entries written.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of entries read.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of entries taken or deleted.
    pub fn takes(&self) -> u64 {
        self.takes.load(Ordering::Relaxed)
    }

    /// Returns the number of containers created.
    pub fn containers_created(&self) -> u64 {
        self.containers_created.load(Ordering::Relaxed)
    }

    /// Returns the number of containers destroyed.
    pub fn containers_destroyed(&self) -> u64 {
        self.containers_destroyed.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions started.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions aborted.
    pub fn transactions_aborted(&self) -> u64 {
        self.transactions_aborted.load(Ordering::Relaxed)
    }

    /// Returns the number of operations that hit a held lock.
    ///
    /// A high value relative to writes and takes means transactions
    /// contend for the same entries.
    pub fn lock_conflicts(&self) -> u64 {
        self.lock_conflicts.load(Ordering::Relaxed)
    }

    /// Returns the number of failed operations.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            writes: self.writes(),
            reads: self.reads(),
            takes: self.takes(),
            containers_created: self.containers_created(),
            containers_destroyed: self.containers_destroyed(),
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_aborted: self.transactions_aborted(),
            lock_conflicts: self.lock_conflicts(),
            errors: self.errors(),
        }
    }
}

/// A point-in-time copy of [`SpaceStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Entries written.
    pub writes: u64,
    /// Entries read.
    pub reads: u64,
    /// Entries taken or deleted.
    pub takes: u64,
    /// Containers created.
    pub containers_created: u64,
    /// Containers destroyed.
    pub containers_destroyed: u64,
    /// Transactions started.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Transactions aborted.
    pub transactions_aborted: u64,
    /// Operations that hit a held lock.
    pub lock_conflicts: u64,
    /// Failed operations.
    pub errors: u64,
}
