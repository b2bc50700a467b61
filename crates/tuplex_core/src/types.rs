//! Core type definitions for Tuplex.

use std::fmt;
use tuplex_storage::StorageTxn;

/// Unique identifier for a transaction.
///
/// Transaction IDs are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the storage handle used for changes made under this transaction.
    #[must_use]
    pub const fn storage_txn(self) -> StorageTxn {
        StorageTxn::new(self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Identifier of a sub-transaction.
///
/// Derived from the parent transaction ID plus a per-transaction sequence
/// number, so the owning transaction is always recoverable from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubTransactionId {
    txn: TransactionId,
    seq: u32,
}

impl SubTransactionId {
    /// Creates a sub-transaction ID.
    #[must_use]
    pub const fn new(txn: TransactionId, seq: u32) -> Self {
        Self { txn, seq }
    }

    /// Returns the parent transaction.
    #[must_use]
    pub const fn transaction(self) -> TransactionId {
        self.txn
    }

    /// Returns the sequence number within the parent.
    #[must_use]
    pub const fn seq(self) -> u32 {
        self.seq
    }

    /// Returns the storage handle used for changes made under this sub-transaction.
    #[must_use]
    pub const fn storage_txn(self) -> StorageTxn {
        self.txn.storage_txn()
    }
}

impl fmt::Display for SubTransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stx:{}.{}", self.txn.0, self.seq)
    }
}

/// Identifier for a container.
///
/// Container IDs are stable references assigned at creation. They stay
/// valid keys regardless of the container's lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(pub u64);

impl ContainerId {
    /// Creates a new container ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cnt:{}", self.0)
    }
}

/// Isolation level of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    /// Only committed state is visible; reads install no locks.
    ReadCommitted,
    /// Read locks are held for the transaction's duration.
    #[default]
    RepeatableRead,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadCommitted => f.write_str("read-committed"),
            Self::RepeatableRead => f.write_str("repeatable-read"),
        }
    }
}
