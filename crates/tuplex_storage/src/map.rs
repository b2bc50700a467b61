//! Stored map contract.

use crate::error::StorageResult;
use std::fmt;

/// Handle of the unit of work a storage mutation belongs to.
///
/// Backends with real persistence use it to group changes so that a
/// commit flushes them and a rollback undoes them. The in-memory backend
/// applies every change immediately and ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageTxn(pub u64);

impl StorageTxn {
    /// Creates a new storage transaction handle.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StorageTxn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stxn:{}", self.0)
    }
}

/// A named key/value map owned by a container or coordinator.
///
/// # Invariants
///
/// - `put` returns the previous value for the key, if any
/// - `remove` returns the removed value, if any
/// - After `destroy`, every operation fails with
///   [`StorageError::Destroyed`](crate::StorageError::Destroyed)
/// - Implementations must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStoredMap`] - For in-memory spaces and tests
pub trait StoredMap<K, V>: Send + Sync {
    /// Returns the name the map was created with.
    fn name(&self) -> &str;

    /// Returns a copy of the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the map was destroyed or the backend fails.
    fn get(&self, key: &K) -> StorageResult<Option<V>>;

    /// Stores `value` under `key`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the map was destroyed or the backend fails.
    fn put(&self, key: K, value: V, txn: Option<StorageTxn>) -> StorageResult<Option<V>>;

    /// Removes `key`, returning the value it held.
    ///
    /// # Errors
    ///
    /// Returns an error if the map was destroyed or the backend fails.
    fn remove(&self, key: &K, txn: Option<StorageTxn>) -> StorageResult<Option<V>>;

    /// Checks whether `key` is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the map was destroyed or the backend fails.
    fn contains_key(&self, key: &K) -> StorageResult<bool>;

    /// Returns the number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the map was destroyed or the backend fails.
    fn len(&self) -> StorageResult<usize>;

    /// Returns true if the map holds no keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the map was destroyed or the backend fails.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns a snapshot of all keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the map was destroyed or the backend fails.
    fn keys(&self) -> StorageResult<Vec<K>>;

    /// Returns a snapshot of all values.
    ///
    /// # Errors
    ///
    /// Returns an error if the map was destroyed or the backend fails.
    fn values(&self) -> StorageResult<Vec<V>>;

    /// Removes every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the map was destroyed or the backend fails.
    fn clear(&self, txn: Option<StorageTxn>) -> StorageResult<()>;

    /// Drops the map and releases its storage.
    ///
    /// Destroying an already destroyed map is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to release the storage.
    fn destroy(&self) -> StorageResult<()>;

    /// Returns true once [`destroy`](Self::destroy) has run.
    fn is_destroyed(&self) -> bool;
}
