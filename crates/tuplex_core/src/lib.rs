//! # Tuplex Core
//!
//! Transactional tuple space engine.
//!
//! This crate provides:
//! - Entries with runtime types and dynamic values
//! - Lock-based isolation of entries and containers (read committed and
//!   repeatable read)
//! - Transactions made of sub-transactions, each with an operation log that
//!   is replayed on commit and rollback
//! - Coordinators (random, fifo, key, type, query) that register entries and
//!   turn selectors into selection chains
//! - The [`Space`] that ties these together
//!
//! ## Example
//!
//! ```rust
//! use tuplex_core::{
//!     ContainerConfig, CoordinatorConfig, Count, Entry, EntryType, Selector, Space,
//! };
//!
//! let order = EntryType::new("order");
//! let rush = EntryType::subtype("rush-order", &order);
//!
//! let space = Space::default();
//! let orders = space
//!     .create_container(
//!         ContainerConfig::named("orders")
//!             .coordinator(CoordinatorConfig::fifo())
//!             .coordinator(CoordinatorConfig::typed([order.clone()])),
//!     )
//!     .unwrap();
//!
//! space.write(orders, Entry::typed(order.clone(), "regular")).unwrap();
//! space.write(orders, Entry::typed(rush, "urgent")).unwrap();
//!
//! // Subtypes are selected as well.
//! let all = space.read(orders, &[Selector::of_type([order], Count::All)]).unwrap();
//! assert_eq!(all.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod access;
mod config;
mod container;
mod coordinator;
mod entry;
mod error;
mod isolation;
mod query;
mod selector;
mod space;
mod stats;
mod transaction;
mod types;

pub use access::{AccessPolicy, AccessRequest, AllowAll};
pub use config::{ContainerConfig, SpaceConfig};
pub use container::{Container, ContainerRegistry};
pub use coordinator::{
    CoordinationData, Coordinator, CoordinatorConfig, CoordinatorKind, CoordinatorSpec, EntryMap,
    FifoCoordinator, KeyCoordinator, NoOperationCoordinator, QueryCoordinator, RandomCoordinator,
    TypeCoordinator,
};
pub use entry::{Entry, EntryId, EntryType, Value, ROOT_TYPE};
pub use error::{CoreError, CoreResult, CountShortfall};
pub use isolation::{
    Availability, ContainerOperation, EntryOperation, HolderKind, IsolationManager, Lock,
    LockResult, LockSnapshot, Owner,
};
pub use query::{PredicateEngine, PropertyIndex, Query, QueryEngine};
pub use selector::{
    Count, EntrySelector, SelectionContext, Selector, SelectorKind, COUNT_ALL, COUNT_MAX,
};
pub use space::{Space, SpaceTxn};
pub use stats::{SpaceStats, StatsSnapshot};
pub use transaction::{
    LogCategory, LogContext, LogItem, OperationLog, SubTransaction, Transaction,
    TransactionManager, TransactionStatus, COMMIT_ORDER, ROLLBACK_ORDER,
};
pub use types::{ContainerId, IsolationLevel, SubTransactionId, TransactionId};
