//! Lock-based isolation of entries and containers.
//!
//! The [`IsolationManager`] owns one [`Lock`] per live entry and per live
//! container. Every space operation asks it two questions: is the item
//! visible and usable for this transaction ([`Availability`]), and can the
//! transaction become a holder of the item ([`LockResult`]).
//!
//! Isolation levels:
//!
//! - **Read committed**: reads install no lock and never see pending inserts.
//! - **Repeatable read**: reads hold a read lock until the transaction ends,
//!   and pending inserts or deletes of other transactions block instead of
//!   being skipped.

mod availability;
mod lock;
mod manager;

pub use availability::Availability;
pub use lock::{HolderKind, Lock, LockSnapshot, Owner};
pub use manager::{IsolationManager, LockResult};

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// Operation on an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryOperation {
    /// Insert a new entry.
    Write,
    /// Read without removing.
    Read,
    /// Remove the entry (take or delete).
    Take,
}

impl EntryOperation {
    /// The lock slot the operation acquires.
    #[must_use]
    pub const fn holder_kind(self) -> HolderKind {
        match self {
            Self::Write => HolderKind::Insert,
            Self::Read => HolderKind::Read,
            Self::Take => HolderKind::Delete,
        }
    }
}

impl fmt::Display for EntryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => f.write_str("write"),
            Self::Read => f.write_str("read"),
            Self::Take => f.write_str("take"),
        }
    }
}

/// Operation on a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerOperation {
    /// Create the container.
    Create,
    /// Read entries of the container.
    Read,
    /// Write entries into the container.
    Write,
    /// Take entries from the container.
    Take,
    /// Destroy the container.
    Destroy,
    /// Lock the container exclusively.
    Lock,
}

impl ContainerOperation {
    /// The lock slot the operation acquires.
    ///
    /// # Errors
    ///
    /// Entry-level operations only check container availability and acquire
    /// no container holder; asking for theirs is an internal error.
    pub fn holder_kind(self) -> CoreResult<HolderKind> {
        match self {
            Self::Create => Ok(HolderKind::Insert),
            Self::Destroy => Ok(HolderKind::Delete),
            Self::Lock => Ok(HolderKind::Exclusive),
            Self::Read | Self::Write | Self::Take => Err(CoreError::internal(format!(
                "container operation {self:?} holds no container lock"
            ))),
        }
    }
}

impl From<EntryOperation> for ContainerOperation {
    fn from(op: EntryOperation) -> Self {
        match op {
            EntryOperation::Write => Self::Write,
            EntryOperation::Read => Self::Read,
            EntryOperation::Take => Self::Take,
        }
    }
}
