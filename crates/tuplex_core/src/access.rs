//! Authorization seam for entry selection.

use crate::entry::Entry;
use crate::isolation::EntryOperation;
use crate::types::{ContainerId, TransactionId};
use std::fmt;

/// A selected entry about to be handed to a transaction.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    /// The requesting transaction.
    pub transaction: TransactionId,
    /// The container holding the entry.
    pub container: ContainerId,
    /// What the transaction wants to do with the entry.
    pub operation: EntryOperation,
    /// The candidate entry.
    pub entry: &'a Entry,
}

/// Decides whether a transaction may use an entry.
///
/// Denied entries are dropped from a selection. A mandatory selection
/// that loses an entry this way fails with
/// [`CoreError::AccessDenied`](crate::CoreError::AccessDenied).
pub trait AccessPolicy: Send + Sync {
    /// Returns true if the request is allowed.
    fn permits(&self, request: &AccessRequest<'_>) -> bool;
}

impl<F> AccessPolicy for F
where
    F: Fn(&AccessRequest<'_>) -> bool + Send + Sync,
{
    fn permits(&self, request: &AccessRequest<'_>) -> bool {
        self(request)
    }
}

/// Policy that allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn permits(&self, _request: &AccessRequest<'_>) -> bool {
        true
    }
}

impl fmt::Debug for dyn AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessPolicy")
    }
}
