//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The map was destroyed and can no longer be used.
    #[error("stored map destroyed: {name}")]
    Destroyed {
        /// Name of the destroyed map.
        name: String,
    },

    /// A map with this name is already registered in the catalog.
    #[error("stored map already exists: {name}")]
    MapExists {
        /// Name of the existing map.
        name: String,
    },

    /// The backing store failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Creates a destroyed-map error.
    pub fn destroyed(name: impl Into<String>) -> Self {
        Self::Destroyed { name: name.into() }
    }
}
