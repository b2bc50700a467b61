//! Entry selection.
//!
//! A selection request is a list of immutable [`Selector`]s. The container
//! turns that list into a chain of runtime [`EntrySelector`]s, each owning
//! its predecessor: the first one enumerates its coordinator's entries and
//! checks them against the isolation manager and the access policy, every
//! later one narrows its predecessor's result to the entries registered at
//! its own coordinator.
//!
//! Count semantics:
//!
//! | count | result |
//! |---|---|
//! | `Exact(n)` | at least `n` accessible entries or an error, `n` returned |
//! | `All` | every candidate, all of them accessible, or an error |
//! | `Max` | every accessible candidate; never fails on count |

mod accessibility;
mod chain;

pub(crate) use chain::{ChainSelector, SelectionStrategy};

use crate::access::AccessPolicy;
use crate::coordinator::CoordinatorKind;
use crate::entry::{Entry, EntryType};
use crate::error::{CoreError, CoreResult};
use crate::isolation::{EntryOperation, IsolationManager};
use crate::query::Query;
use crate::types::{ContainerId, IsolationLevel, SubTransactionId};
use std::fmt;

/// Raw count value selecting every accessible entry.
pub const COUNT_MAX: i64 = -1;

/// Raw count value selecting every entry, all of which must be accessible.
pub const COUNT_ALL: i64 = -2;

/// How many entries a selector delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Count {
    /// Exactly this many (positive).
    Exact(usize),
    /// All candidates; any inaccessible candidate fails the selection.
    All,
    /// As many as are accessible.
    Max,
}

impl Count {
    /// Parses a raw count: a positive number, [`COUNT_MAX`] or [`COUNT_ALL`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCount`] for zero and other negative values.
    pub fn from_raw(value: i64) -> CoreResult<Self> {
        match value {
            COUNT_MAX => Ok(Self::Max),
            COUNT_ALL => Ok(Self::All),
            n if n > 0 => usize::try_from(n)
                .map(Self::Exact)
                .map_err(|_| CoreError::InvalidCount { value }),
            _ => Err(CoreError::InvalidCount { value }),
        }
    }

    /// Returns the raw form of the count.
    #[must_use]
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Exact(n) => i64::try_from(n).unwrap_or(i64::MAX),
            Self::All => COUNT_ALL,
            Self::Max => COUNT_MAX,
        }
    }

    /// Returns true if the selection fails when a candidate is inaccessible.
    #[must_use]
    pub const fn is_mandatory(self) -> bool {
        !matches!(self, Self::Max)
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::All => f.write_str("all"),
            Self::Max => f.write_str("max"),
        }
    }
}

/// Coordinator-specific part of a selector.
#[derive(Debug, Clone)]
pub enum SelectorKind {
    /// Uniformly random order.
    Random,
    /// Registration order.
    Fifo,
    /// Entries registered under a key.
    Key(String),
    /// Entries of any of the types or their subtypes.
    Type(Vec<EntryType>),
    /// Entries matching a query.
    Query(Query),
}

impl SelectorKind {
    /// The coordinator kind able to run this selector.
    #[must_use]
    pub const fn coordinator_kind(&self) -> CoordinatorKind {
        match self {
            Self::Random => CoordinatorKind::Random,
            Self::Fifo => CoordinatorKind::Fifo,
            Self::Key(_) => CoordinatorKind::Key,
            Self::Type(_) => CoordinatorKind::Type,
            Self::Query(_) => CoordinatorKind::Query,
        }
    }
}

/// An immutable selection request step.
///
/// ```rust
/// use tuplex_core::{Count, EntryType, Query, Selector};
///
/// let step1 = Selector::of_type([EntryType::new("order")], Count::Max);
/// let step2 = Selector::query(Query::lt("price", 20), Count::Exact(2)).on("by_price");
/// assert_eq!(step2.coordinator(), Some("by_price"));
/// # let _ = step1;
/// ```
#[derive(Debug, Clone)]
pub struct Selector {
    kind: SelectorKind,
    count: Count,
    coordinator: Option<String>,
}

impl Selector {
    fn with_kind(kind: SelectorKind, count: Count) -> Self {
        Self {
            kind,
            count,
            coordinator: None,
        }
    }

    /// Selects entries in random order.
    #[must_use]
    pub fn random(count: Count) -> Self {
        Self::with_kind(SelectorKind::Random, count)
    }

    /// Selects entries in registration order.
    #[must_use]
    pub fn fifo(count: Count) -> Self {
        Self::with_kind(SelectorKind::Fifo, count)
    }

    /// Selects the entry registered under `key`.
    pub fn key(key: impl Into<String>) -> Self {
        Self::with_kind(SelectorKind::Key(key.into()), Count::Exact(1))
    }

    /// Selects entries of the given types, subtypes included.
    pub fn of_type(types: impl IntoIterator<Item = EntryType>, count: Count) -> Self {
        Self::with_kind(SelectorKind::Type(types.into_iter().collect()), count)
    }

    /// Selects entries matching `query`.
    #[must_use]
    pub fn query(query: Query, count: Count) -> Self {
        Self::with_kind(SelectorKind::Query(query), count)
    }

    /// Runs the selector on the coordinator with this name instead of the
    /// first coordinator of the matching kind.
    #[must_use]
    pub fn on(mut self, coordinator: impl Into<String>) -> Self {
        self.coordinator = Some(coordinator.into());
        self
    }

    /// Replaces the count.
    #[must_use]
    pub fn with_count(mut self, count: Count) -> Self {
        self.count = count;
        self
    }

    /// Returns the coordinator-specific part.
    #[must_use]
    pub fn kind(&self) -> &SelectorKind {
        &self.kind
    }

    /// Returns the count.
    #[must_use]
    pub fn count(&self) -> Count {
        self.count
    }

    /// Returns the explicitly addressed coordinator, if any.
    #[must_use]
    pub fn coordinator(&self) -> Option<&str> {
        self.coordinator.as_deref()
    }
}

/// Everything a selection needs to know about the requester.
#[derive(Clone, Copy)]
pub struct SelectionContext<'a> {
    /// Isolation manager answering availability questions.
    pub isolation: &'a IsolationManager,
    /// Authorization layer.
    pub access: &'a dyn AccessPolicy,
    /// Container being selected from.
    pub container: ContainerId,
    /// Operation the selected entries are for.
    pub operation: EntryOperation,
    /// Isolation level of the requester.
    pub level: IsolationLevel,
    /// Requesting sub-transaction.
    pub stx: SubTransactionId,
}

impl fmt::Debug for SelectionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionContext")
            .field("container", &self.container)
            .field("operation", &self.operation)
            .field("level", &self.level)
            .field("stx", &self.stx)
            .finish_non_exhaustive()
    }
}

/// A runtime selector: one link of a selection chain.
pub trait EntrySelector: Send {
    /// The selector's count.
    fn count(&self) -> Count;

    /// Returns the selection result, applying count semantics.
    ///
    /// # Errors
    ///
    /// [`CoreError::CountNotMet`], [`CoreError::EntryLocked`] or
    /// [`CoreError::AccessDenied`] when the count cannot be honoured.
    fn get_all(&mut self, ctx: &SelectionContext<'_>) -> CoreResult<Vec<Entry>>;

    /// Returns the next accessible entry, skipping inaccessible ones.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage or the isolation manager fails.
    fn get_next(&mut self, ctx: &SelectionContext<'_>) -> CoreResult<Option<Entry>>;
}
