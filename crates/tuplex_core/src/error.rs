//! Error types for Tuplex core.

use crate::entry::EntryId;
use crate::isolation::Owner;
use crate::selector::Count;
use crate::types::ContainerId;
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Why a selection delivered fewer entries than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountShortfall {
    /// Enough candidates exist, but fewer than requested are visible or
    /// survive the selector's filter.
    HardCount,
    /// Fewer candidates than requested exist at all.
    Scarcity,
    /// A `Count::All` selection lost one of its members before it could be locked.
    AllOrNothing,
}

impl fmt::Display for CountShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardCount => f.write_str("hard count"),
            Self::Scarcity => f.write_str("scarcity"),
            Self::AllOrNothing => f.write_str("all-or-nothing"),
        }
    }
}

/// Errors that can occur in Tuplex core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] tuplex_storage::StorageError),

    /// The entry no longer exists (it was concurrently deleted).
    #[error("invalid entry: {entry}")]
    InvalidEntry {
        /// The entry that was referenced.
        entry: EntryId,
    },

    /// The container no longer exists or is not visible.
    #[error("invalid container: {container}")]
    InvalidContainer {
        /// The container that was referenced.
        container: ContainerId,
    },

    /// No container is registered under the name.
    #[error("container not found: {name}")]
    ContainerNotFound {
        /// Name that was looked up.
        name: String,
    },

    /// A container-level lock of another transaction blocks the operation.
    #[error("container {container} locked by {holder}")]
    ContainerLocked {
        /// The locked container.
        container: ContainerId,
        /// Holder of the blocking lock.
        holder: Owner,
    },

    /// Fewer accessible entries than the selector's count demands.
    #[error("count not met ({shortfall}): requested {requested}, available {available}")]
    CountNotMet {
        /// The requested count.
        requested: Count,
        /// Number of entries that could be selected.
        available: usize,
        /// Why the count was missed.
        shortfall: CountShortfall,
    },

    /// An entry required by a mandatory selection is locked.
    #[error("entry {entry} locked by {holder}")]
    EntryLocked {
        /// The blocking entry.
        entry: EntryId,
        /// Holder of the blocking lock.
        holder: Owner,
    },

    /// The authorization layer rejected an entry of a mandatory selection.
    #[error("access denied to entry {entry}")]
    AccessDenied {
        /// The rejected entry.
        entry: EntryId,
    },

    /// The type coordinator's allow-list rejected the entry.
    #[error("invalid entry type: {type_name}")]
    InvalidEntryType {
        /// Name of the rejected type.
        type_name: String,
    },

    /// The key coordinator already holds a live entry under the key.
    #[error("duplicate key: {key}")]
    DuplicateKey {
        /// The conflicting key.
        key: String,
    },

    /// The container reached its maximum size.
    #[error("container {container} full (max {max_size} entries)")]
    ContainerFull {
        /// The full container.
        container: ContainerId,
        /// Configured maximum.
        max_size: usize,
    },

    /// Another container already uses the name.
    #[error("container name already taken: {name}")]
    ContainerNameTaken {
        /// The requested name.
        name: String,
    },

    /// The container has no coordinator with the requested name.
    #[error("unknown coordinator: {name}")]
    UnknownCoordinator {
        /// The requested coordinator name.
        name: String,
    },

    /// A coordinator needs data the write did not supply.
    #[error("missing coordination data for coordinator {coordinator}")]
    MissingCoordinationData {
        /// Name of the coordinator.
        coordinator: String,
    },

    /// The selector cannot run on the addressed coordinator.
    #[error("unsupported selector: {message}")]
    UnsupportedSelector {
        /// Description of the mismatch.
        message: String,
    },

    /// A raw count value is not a positive number, `COUNT_MAX` or `COUNT_ALL`.
    #[error("invalid count: {value}")]
    InvalidCount {
        /// The rejected raw value.
        value: i64,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// An internal invariant was violated. Never retried.
    #[error("internal invariant violated: {message}")]
    Internal {
        /// Description of the violation.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an internal invariant violation error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an unsupported selector error.
    pub fn unsupported_selector(message: impl Into<String>) -> Self {
        Self::UnsupportedSelector {
            message: message.into(),
        }
    }

    /// Returns true if repeating the request later may succeed.
    ///
    /// Schedulers use this to decide between rescheduling a request and
    /// reporting the failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EntryLocked { .. } | Self::ContainerLocked { .. } | Self::CountNotMet { .. }
        )
    }

    /// Returns true for internal invariant violations.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SubTransactionId, TransactionId};

    #[test]
    fn locked_errors_are_retryable() {
        let holder = Owner::Sub(SubTransactionId::new(TransactionId::new(1), 1));
        let err = CoreError::EntryLocked {
            entry: EntryId::from_bytes([0; 16]),
            holder,
        };
        assert!(err.is_retryable());
        assert!(!err.is_internal());
    }

    #[test]
    fn internal_errors_are_not_retryable() {
        let err = CoreError::internal("duplicate lock");
        assert!(!err.is_retryable());
        assert!(err.is_internal());
        assert_eq!(err.to_string(), "internal invariant violated: duplicate lock");
    }

    #[test]
    fn count_not_met_message() {
        let err = CoreError::CountNotMet {
            requested: Count::Exact(3),
            available: 1,
            shortfall: CountShortfall::Scarcity,
        };
        assert_eq!(
            err.to_string(),
            "count not met (scarcity): requested 3, available 1"
        );
    }
}
