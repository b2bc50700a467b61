//! Availability decision tables.
//!
//! A lock's holders are first classified into a single state relative to
//! the requesting transaction, in priority order. The outcome is then a
//! plain lookup over (isolation level, operation, state). Combinations the
//! tables do not list are internal errors.

use super::lock::{LockSnapshot, Owner};
use super::{ContainerOperation, EntryOperation};
use crate::error::{CoreError, CoreResult};
use crate::types::{IsolationLevel, TransactionId};
use tracing::error;

/// Availability of an entry or container for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The operation may proceed.
    Available,
    /// The item does not exist for the requester.
    NotVisible,
    /// The item exists but another transaction's holder blocks the operation.
    NotAvailable {
        /// The blocking holder.
        holder: Owner,
    },
}

/// Entry lock state as seen by one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    /// No lock: the entry is gone.
    Gone,
    /// The requester already deletes the entry.
    TakenBySelf,
    /// Written by another transaction, not committed.
    PendingInsert(Owner),
    /// Exclusively held by another transaction.
    Exclusive(Owner),
    /// Being deleted by another transaction.
    PendingDelete(Owner),
    /// Read by at least one other transaction.
    ForeignReaders(Owner),
    /// Nothing held by anyone else.
    Free,
}

fn classify_entry(lock: Option<&LockSnapshot>, txn: TransactionId) -> EntryState {
    let Some(h) = lock else {
        return EntryState::Gone;
    };
    let other = |slot: Option<Owner>| slot.filter(|o| o.transaction() != txn);
    if h.delete.is_some_and(|d| d.transaction() == txn) {
        EntryState::TakenBySelf
    } else if let Some(o) = other(h.insert) {
        EntryState::PendingInsert(o)
    } else if let Some(o) = other(h.exclusive) {
        EntryState::Exclusive(o)
    } else if let Some(o) = other(h.delete) {
        EntryState::PendingDelete(o)
    } else if let Some(o) = h.foreign_reader(txn) {
        EntryState::ForeignReaders(o)
    } else {
        EntryState::Free
    }
}

pub(crate) fn entry_availability(
    lock: Option<&LockSnapshot>,
    op: EntryOperation,
    level: IsolationLevel,
    txn: TransactionId,
) -> CoreResult<Availability> {
    use Availability::{Available, NotAvailable, NotVisible};
    use EntryOperation::{Read, Take};
    use EntryState::*;
    use IsolationLevel::{ReadCommitted as Rc, RepeatableRead as Rr};

    let state = classify_entry(lock, txn);
    let outcome = match (level, op, state) {
        (_, Read | Take, Gone | TakenBySelf) => NotVisible,

        (Rc, Read | Take, PendingInsert(_)) => NotVisible,
        (Rr, Read | Take, PendingInsert(holder)) => NotAvailable { holder },

        (_, Read | Take, Exclusive(holder)) => NotAvailable { holder },

        (Rc, Read, PendingDelete(_)) => Available,
        (Rc, Take, PendingDelete(_)) => NotVisible,
        (Rr, Read | Take, PendingDelete(holder)) => NotAvailable { holder },

        (_, Read, ForeignReaders(_)) => Available,
        (_, Take, ForeignReaders(holder)) => NotAvailable { holder },

        (_, Read | Take, Free) => Available,

        (level, op @ EntryOperation::Write, state) => {
            error!(%level, ?op, ?state, "entry availability requested for unlisted operation");
            return Err(CoreError::internal(format!(
                "no entry availability rule for {op:?} under {level}"
            )));
        }
    };
    Ok(outcome)
}

/// Container lock state as seen by one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerState {
    /// No lock: the container is gone.
    Gone,
    /// The requester already destroys the container.
    DestroyedBySelf,
    /// Created by another transaction, not committed.
    PendingCreate(Owner),
    /// Locked by another transaction.
    Exclusive(Owner),
    /// Being destroyed by another transaction.
    PendingDestroy(Owner),
    /// Nothing held by anyone else.
    Free,
}

fn classify_container(lock: Option<&LockSnapshot>, txn: TransactionId) -> ContainerState {
    let Some(h) = lock else {
        return ContainerState::Gone;
    };
    let other = |slot: Option<Owner>| slot.filter(|o| o.transaction() != txn);
    if h.delete.is_some_and(|d| d.transaction() == txn) {
        ContainerState::DestroyedBySelf
    } else if let Some(o) = other(h.insert) {
        ContainerState::PendingCreate(o)
    } else if let Some(o) = other(h.exclusive) {
        ContainerState::Exclusive(o)
    } else if let Some(o) = other(h.delete) {
        ContainerState::PendingDestroy(o)
    } else {
        ContainerState::Free
    }
}

pub(crate) fn container_availability(
    lock: Option<&LockSnapshot>,
    op: ContainerOperation,
    level: IsolationLevel,
    txn: TransactionId,
) -> CoreResult<Availability> {
    use Availability::{Available, NotAvailable, NotVisible};
    use ContainerOperation::{Destroy, Lock, Read, Take, Write};
    use ContainerState::*;
    use IsolationLevel::ReadCommitted as Rc;

    let state = classify_container(lock, txn);
    let outcome = match (level, op, state) {
        (_, Read | Write | Take | Destroy | Lock, Gone | DestroyedBySelf) => NotVisible,
        (_, Read | Write | Take | Destroy | Lock, PendingCreate(_)) => NotVisible,
        (_, Read | Write | Take | Destroy | Lock, Exclusive(holder)) => NotAvailable { holder },
        (Rc, Read, PendingDestroy(_)) => Available,
        (_, Read | Write | Take | Destroy | Lock, PendingDestroy(holder)) => {
            NotAvailable { holder }
        }
        (_, Read | Write | Take | Destroy | Lock, Free) => Available,

        (level, op @ ContainerOperation::Create, state) => {
            error!(%level, ?op, ?state, "container availability requested for unlisted operation");
            return Err(CoreError::internal(format!(
                "no container availability rule for {op:?} under {level}"
            )));
        }
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubTransactionId;
    use std::sync::Arc;

    const ME: TransactionId = TransactionId::new(1);
    const OTHER: TransactionId = TransactionId::new(2);

    fn sub(txn: TransactionId) -> Owner {
        Owner::Sub(SubTransactionId::new(txn, 1))
    }

    fn inserted_by(owner: Owner) -> LockSnapshot {
        LockSnapshot {
            insert: Some(owner),
            ..LockSnapshot::default()
        }
    }

    fn deleted_by(owner: Owner) -> LockSnapshot {
        LockSnapshot {
            delete: Some(owner),
            ..LockSnapshot::default()
        }
    }

    fn read_by(owner: Owner) -> LockSnapshot {
        LockSnapshot {
            readers: Arc::from(vec![owner]),
            ..LockSnapshot::default()
        }
    }

    fn entry(
        lock: Option<&LockSnapshot>,
        op: EntryOperation,
        level: IsolationLevel,
    ) -> Availability {
        entry_availability(lock, op, level, ME).unwrap()
    }

    #[test]
    fn missing_lock_is_not_visible() {
        for level in [IsolationLevel::ReadCommitted, IsolationLevel::RepeatableRead] {
            assert_eq!(
                entry(None, EntryOperation::Read, level),
                Availability::NotVisible
            );
        }
    }

    #[test]
    fn own_pending_insert_is_available() {
        let lock = inserted_by(sub(ME));
        assert_eq!(
            entry(Some(&lock), EntryOperation::Take, IsolationLevel::RepeatableRead),
            Availability::Available
        );
    }

    #[test]
    fn foreign_insert_hidden_under_read_committed() {
        let lock = inserted_by(sub(OTHER));
        assert_eq!(
            entry(Some(&lock), EntryOperation::Read, IsolationLevel::ReadCommitted),
            Availability::NotVisible
        );
    }

    #[test]
    fn foreign_insert_blocks_under_repeatable_read() {
        let lock = inserted_by(sub(OTHER));
        assert_eq!(
            entry(Some(&lock), EntryOperation::Take, IsolationLevel::RepeatableRead),
            Availability::NotAvailable { holder: sub(OTHER) }
        );
    }

    #[test]
    fn foreign_delete_depends_on_level_and_operation() {
        let lock = deleted_by(sub(OTHER));
        assert_eq!(
            entry(Some(&lock), EntryOperation::Read, IsolationLevel::ReadCommitted),
            Availability::Available
        );
        assert_eq!(
            entry(Some(&lock), EntryOperation::Take, IsolationLevel::ReadCommitted),
            Availability::NotVisible
        );
        assert_eq!(
            entry(Some(&lock), EntryOperation::Read, IsolationLevel::RepeatableRead),
            Availability::NotAvailable { holder: sub(OTHER) }
        );
    }

    #[test]
    fn own_delete_hides_entry() {
        let lock = deleted_by(Owner::Tx(ME));
        assert_eq!(
            entry(Some(&lock), EntryOperation::Read, IsolationLevel::RepeatableRead),
            Availability::NotVisible
        );
    }

    #[test]
    fn foreign_readers_block_take_only() {
        let lock = read_by(sub(OTHER));
        assert_eq!(
            entry(Some(&lock), EntryOperation::Read, IsolationLevel::RepeatableRead),
            Availability::Available
        );
        assert_eq!(
            entry(Some(&lock), EntryOperation::Take, IsolationLevel::RepeatableRead),
            Availability::NotAvailable { holder: sub(OTHER) }
        );
    }

    #[test]
    fn surrendered_holder_counts_for_whole_transaction() {
        let lock = inserted_by(Owner::Tx(ME));
        assert_eq!(
            entry(Some(&lock), EntryOperation::Take, IsolationLevel::RepeatableRead),
            Availability::Available
        );
    }

    #[test]
    fn write_has_no_entry_rule() {
        let result = entry_availability(
            None,
            EntryOperation::Write,
            IsolationLevel::RepeatableRead,
            ME,
        );
        assert!(matches!(result, Err(CoreError::Internal { .. })));
    }

    #[test]
    fn foreign_pending_create_hides_container() {
        let lock = inserted_by(sub(OTHER));
        let result = container_availability(
            Some(&lock),
            ContainerOperation::Write,
            IsolationLevel::ReadCommitted,
            ME,
        )
        .unwrap();
        assert_eq!(result, Availability::NotVisible);
    }

    #[test]
    fn foreign_pending_destroy_allows_committed_reads() {
        let lock = deleted_by(sub(OTHER));
        let read = container_availability(
            Some(&lock),
            ContainerOperation::Read,
            IsolationLevel::ReadCommitted,
            ME,
        )
        .unwrap();
        let write = container_availability(
            Some(&lock),
            ContainerOperation::Write,
            IsolationLevel::ReadCommitted,
            ME,
        )
        .unwrap();
        assert_eq!(read, Availability::Available);
        assert_eq!(write, Availability::NotAvailable { holder: sub(OTHER) });
    }

    #[test]
    fn create_has_no_container_rule() {
        let result = container_availability(
            None,
            ContainerOperation::Create,
            IsolationLevel::ReadCommitted,
            ME,
        );
        assert!(result.unwrap_err().is_internal());
    }
}
