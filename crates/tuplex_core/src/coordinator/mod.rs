//! Coordinators: per-container registration and selection strategies.
//!
//! Every entry written into a container is registered with each of the
//! container's coordinators. A coordinator keeps the entry in its own
//! stored map plus whatever auxiliary index its strategy needs, and turns
//! matching [`Selector`]s into runtime [`EntrySelector`]s.

mod config;
mod entry_map;
mod fifo;
mod key;
mod noop;
mod query;
mod random;
mod typed;

pub use config::{CoordinatorConfig, CoordinatorSpec};
pub(crate) use config::CoordinatorEnv;
pub use entry_map::EntryMap;
pub use fifo::FifoCoordinator;
pub use key::KeyCoordinator;
pub use noop::NoOperationCoordinator;
pub use query::QueryCoordinator;
pub use random::RandomCoordinator;
pub use typed::TypeCoordinator;

use crate::entry::{Entry, EntryId};
use crate::error::{CoreError, CoreResult};
use crate::isolation::IsolationManager;
use crate::selector::{EntrySelector, Selector};
use crate::types::SubTransactionId;
use std::fmt;
use std::sync::Arc;
use tuplex_storage::StorageTxn;

/// Coordination strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorKind {
    /// Uniformly random selection.
    Random,
    /// Selection in registration order.
    Fifo,
    /// One visible entry per key.
    Key,
    /// Type-based selection with subtype covariance.
    Type,
    /// Predicate-based selection with property indexes.
    Query,
    /// Registration without selection.
    NoOperation,
}

impl CoordinatorKind {
    /// Name a coordinator of this kind gets unless configured otherwise.
    #[must_use]
    pub const fn default_name(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Fifo => "fifo",
            Self::Key => "key",
            Self::Type => "type",
            Self::Query => "query",
            Self::NoOperation => "noop",
        }
    }
}

impl fmt::Display for CoordinatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

/// Extra data a write passes to the container's coordinators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CoordinationData {
    /// Key for key coordinators.
    Key(String),
}

impl CoordinationData {
    /// Key data.
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }
}

/// A registration and selection strategy of a container.
pub trait Coordinator: Send + Sync + fmt::Debug {
    /// Returns the coordinator's name, unique within its container.
    fn name(&self) -> &str;

    /// Returns the strategy.
    fn kind(&self) -> CoordinatorKind;

    /// Registers an entry being written by `stx`.
    ///
    /// # Errors
    ///
    /// Returns a domain error if the strategy rejects the entry, for example
    /// [`CoreError::InvalidEntryType`] or [`CoreError::DuplicateKey`].
    fn register_entry(
        &self,
        stx: SubTransactionId,
        data: &[CoordinationData],
        entry: &Entry,
        isolation: &IsolationManager,
    ) -> CoreResult<()>;

    /// Removes an entry. Returns whether it was registered.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    fn unregister_entry(&self, entry: EntryId, txn: Option<StorageTxn>) -> CoreResult<bool>;

    /// Checks whether an entry is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    fn contains(&self, entry: EntryId) -> CoreResult<bool>;

    /// Returns the number of registered entries.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    fn len(&self) -> CoreResult<usize>;

    /// Returns true if no entry is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drops the coordinator's storage.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    fn destroy(&self) -> CoreResult<()>;

    /// Builds the runtime selector for `selector`, narrowing `predecessor`
    /// when there is one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedSelector`] if the selector is not
    /// meant for this strategy.
    fn create_selector(
        self: Arc<Self>,
        selector: &Selector,
        predecessor: Option<Box<dyn EntrySelector>>,
    ) -> CoreResult<Box<dyn EntrySelector>>;
}

pub(crate) fn mismatch(coordinator: &dyn Coordinator, selector: &Selector) -> CoreError {
    CoreError::unsupported_selector(format!(
        "{:?} selector on {} coordinator {}",
        selector.kind().coordinator_kind(),
        coordinator.kind(),
        coordinator.name()
    ))
}
