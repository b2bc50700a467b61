//! Per-entry and per-container lock.

use crate::types::{SubTransactionId, TransactionId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Holder of a lock slot.
///
/// A holder starts out owned by the sub-transaction that acquired it. When
/// that sub-transaction commits while its parent stays open, the holder is
/// surrendered to the transaction and becomes [`Owner::Tx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Held by a running sub-transaction.
    Sub(SubTransactionId),
    /// Surrendered to the transaction level.
    Tx(TransactionId),
}

impl Owner {
    /// Returns the transaction the holder belongs to.
    #[must_use]
    pub const fn transaction(self) -> TransactionId {
        match self {
            Self::Sub(stx) => stx.transaction(),
            Self::Tx(txn) => txn,
        }
    }

    /// Returns the sub-transaction, unless the holder was surrendered.
    #[must_use]
    pub const fn sub_transaction(self) -> Option<SubTransactionId> {
        match self {
            Self::Sub(stx) => Some(stx),
            Self::Tx(_) => None,
        }
    }

    /// Returns true once the holder was surrendered to its transaction.
    #[must_use]
    pub const fn is_surrendered(self) -> bool {
        matches!(self, Self::Tx(_))
    }

    /// Returns true if a holder `self` acts on behalf of `other`.
    ///
    /// A sub-transaction holder only covers itself. A surrendered holder
    /// covers every owner of the same transaction.
    #[must_use]
    pub fn covers(self, other: Owner) -> bool {
        match self {
            Self::Sub(_) => self == other,
            Self::Tx(txn) => other.transaction() == txn,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sub(stx) => write!(f, "{stx}"),
            Self::Tx(txn) => write!(f, "{txn}"),
        }
    }
}

impl From<SubTransactionId> for Owner {
    fn from(stx: SubTransactionId) -> Self {
        Self::Sub(stx)
    }
}

/// Slot of a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HolderKind {
    /// The item was created by the holder and is not committed yet.
    Insert,
    /// Shared read holder.
    Read,
    /// The holder removes the item.
    Delete,
    /// The holder excludes every other transaction.
    Exclusive,
}

impl fmt::Display for HolderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => f.write_str("insert"),
            Self::Read => f.write_str("read"),
            Self::Delete => f.write_str("delete"),
            Self::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// Point-in-time copy of a lock's holders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSnapshot {
    /// Insert holder.
    pub insert: Option<Owner>,
    /// Delete holder.
    pub delete: Option<Owner>,
    /// Exclusive holder.
    pub exclusive: Option<Owner>,
    /// Read holders, in acquisition order. An owner appears once per read.
    pub readers: Arc<[Owner]>,
}

impl Default for LockSnapshot {
    fn default() -> Self {
        Self {
            insert: None,
            delete: None,
            exclusive: None,
            readers: Arc::from(Vec::new()),
        }
    }
}

impl LockSnapshot {
    /// First read holder that does not belong to `txn`.
    #[must_use]
    pub fn foreign_reader(&self, txn: TransactionId) -> Option<Owner> {
        self.readers
            .iter()
            .copied()
            .find(|r| r.transaction() != txn)
    }

    /// Returns true if no slot is held.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.insert.is_none()
            && self.delete.is_none()
            && self.exclusive.is_none()
            && self.readers.is_empty()
    }
}

fn foreign(holder: Option<Owner>, txn: TransactionId) -> Option<Owner> {
    holder.filter(|h| h.transaction() != txn)
}

/// Outcome of a holder request on a single lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquire {
    /// The holder was installed.
    Granted,
    /// The requesting transaction already holds the slot.
    AlreadyHeld,
    /// Another transaction holds an incompatible slot.
    Blocked(Owner),
    /// The requesting transaction already removes the item, or the lock was purged.
    Gone,
}

#[derive(Debug, Default)]
struct LockState {
    holders: LockSnapshot,
    purged: bool,
}

/// Mutual-exclusion record of one entry or container.
///
/// Each lock guards its holders with its own mutex. Read holders are kept
/// in a shared slice that is replaced on every change, so snapshots taken
/// for availability checks stay valid while writers add or remove readers.
#[derive(Debug, Default)]
pub struct Lock {
    state: Mutex<LockState>,
}

impl Lock {
    /// Creates a lock whose insert slot is held by `owner`.
    #[must_use]
    pub(crate) fn inserted(owner: Owner) -> Self {
        Self {
            state: Mutex::new(LockState {
                holders: LockSnapshot {
                    insert: Some(owner),
                    ..LockSnapshot::default()
                },
                purged: false,
            }),
        }
    }

    /// Returns a copy of the current holders.
    #[must_use]
    pub fn snapshot(&self) -> LockSnapshot {
        self.state.lock().holders.clone()
    }

    pub(crate) fn try_add_reader(&self, owner: Owner) -> Acquire {
        let mut state = self.state.lock();
        let txn = owner.transaction();
        let h = &state.holders;
        if state.purged || h.delete.is_some_and(|d| d.transaction() == txn) {
            return Acquire::Gone;
        }
        if let Some(blocker) = foreign(h.insert, txn)
            .or(foreign(h.delete, txn))
            .or(foreign(h.exclusive, txn))
        {
            return Acquire::Blocked(blocker);
        }
        let mut readers = h.readers.to_vec();
        readers.push(owner);
        state.holders.readers = Arc::from(readers);
        Acquire::Granted
    }

    pub(crate) fn try_set_delete(&self, owner: Owner) -> Acquire {
        let mut state = self.state.lock();
        let txn = owner.transaction();
        let h = &state.holders;
        if state.purged || h.delete.is_some_and(|d| d.transaction() == txn) {
            return Acquire::Gone;
        }
        if let Some(blocker) = foreign(h.insert, txn)
            .or(foreign(h.delete, txn))
            .or(foreign(h.exclusive, txn))
            .or_else(|| h.foreign_reader(txn))
        {
            return Acquire::Blocked(blocker);
        }
        state.holders.delete = Some(owner);
        Acquire::Granted
    }

    pub(crate) fn try_set_exclusive(&self, owner: Owner) -> Acquire {
        let mut state = self.state.lock();
        let txn = owner.transaction();
        let h = &state.holders;
        if state.purged || h.delete.is_some_and(|d| d.transaction() == txn) {
            return Acquire::Gone;
        }
        if h.exclusive.is_some_and(|x| x.transaction() == txn) {
            return Acquire::AlreadyHeld;
        }
        if let Some(blocker) = foreign(h.insert, txn)
            .or(foreign(h.delete, txn))
            .or(foreign(h.exclusive, txn))
            .or_else(|| h.foreign_reader(txn))
        {
            return Acquire::Blocked(blocker);
        }
        state.holders.exclusive = Some(owner);
        Acquire::Granted
    }

    /// Removes `owner`'s holder of `kind`. Returns false if it held none.
    pub(crate) fn release(&self, kind: HolderKind, owner: Owner) -> bool {
        let mut state = self.state.lock();
        let holders = &mut state.holders;
        match kind {
            HolderKind::Insert => take_if(&mut holders.insert, owner),
            HolderKind::Delete => take_if(&mut holders.delete, owner),
            HolderKind::Exclusive => take_if(&mut holders.exclusive, owner),
            HolderKind::Read => match holders.readers.iter().position(|r| *r == owner) {
                Some(pos) => {
                    let mut readers = holders.readers.to_vec();
                    readers.remove(pos);
                    holders.readers = Arc::from(readers);
                    true
                }
                None => false,
            },
        }
    }

    /// Turns `stx`'s holder of `kind` into a transaction-level holder.
    /// Returns false if `stx` held none.
    pub(crate) fn surrender(&self, kind: HolderKind, stx: SubTransactionId) -> bool {
        let from = Owner::Sub(stx);
        let to = Owner::Tx(stx.transaction());
        let mut state = self.state.lock();
        let holders = &mut state.holders;
        let slot = match kind {
            HolderKind::Insert => &mut holders.insert,
            HolderKind::Delete => &mut holders.delete,
            HolderKind::Exclusive => &mut holders.exclusive,
            HolderKind::Read => {
                return match holders.readers.iter().position(|r| *r == from) {
                    Some(pos) => {
                        let mut readers = holders.readers.to_vec();
                        readers[pos] = to;
                        holders.readers = Arc::from(readers);
                        true
                    }
                    None => false,
                };
            }
        };
        if *slot == Some(from) {
            *slot = Some(to);
            true
        } else {
            false
        }
    }

    /// Marks the lock dead. Later requests on a stale handle see [`Acquire::Gone`].
    pub(crate) fn purge(&self) {
        self.state.lock().purged = true;
    }
}

fn take_if(slot: &mut Option<Owner>, owner: Owner) -> bool {
    if *slot == Some(owner) {
        *slot = None;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stx(txn: u64, seq: u32) -> SubTransactionId {
        SubTransactionId::new(TransactionId::new(txn), seq)
    }

    #[test]
    fn readers_share_with_same_tx_insert() {
        let lock = Lock::inserted(Owner::Sub(stx(1, 1)));
        assert_eq!(lock.try_add_reader(Owner::Sub(stx(1, 2))), Acquire::Granted);
        assert_eq!(
            lock.try_add_reader(Owner::Sub(stx(2, 1))),
            Acquire::Blocked(Owner::Sub(stx(1, 1)))
        );
    }

    #[test]
    fn readers_are_compatible_with_each_other() {
        let lock = Lock::default();
        assert_eq!(lock.try_add_reader(Owner::Sub(stx(1, 1))), Acquire::Granted);
        assert_eq!(lock.try_add_reader(Owner::Sub(stx(2, 1))), Acquire::Granted);
        assert_eq!(lock.snapshot().readers.len(), 2);
    }

    #[test]
    fn delete_blocked_by_foreign_reader() {
        let lock = Lock::default();
        lock.try_add_reader(Owner::Sub(stx(1, 1)));
        assert_eq!(
            lock.try_set_delete(Owner::Sub(stx(2, 1))),
            Acquire::Blocked(Owner::Sub(stx(1, 1)))
        );
        // Own readers do not block.
        assert_eq!(lock.try_set_delete(Owner::Sub(stx(1, 2))), Acquire::Granted);
    }

    #[test]
    fn second_delete_by_same_tx_sees_gone() {
        let lock = Lock::default();
        assert_eq!(lock.try_set_delete(Owner::Sub(stx(1, 1))), Acquire::Granted);
        assert_eq!(lock.try_set_delete(Owner::Sub(stx(1, 2))), Acquire::Gone);
        assert_eq!(lock.try_add_reader(Owner::Sub(stx(1, 3))), Acquire::Gone);
    }

    #[test]
    fn exclusive_is_reentrant_per_transaction() {
        let lock = Lock::default();
        assert_eq!(lock.try_set_exclusive(Owner::Sub(stx(1, 1))), Acquire::Granted);
        assert_eq!(
            lock.try_set_exclusive(Owner::Sub(stx(1, 2))),
            Acquire::AlreadyHeld
        );
        assert!(matches!(
            lock.try_set_exclusive(Owner::Sub(stx(2, 1))),
            Acquire::Blocked(_)
        ));
    }

    #[test]
    fn release_requires_exact_owner() {
        let lock = Lock::inserted(Owner::Sub(stx(1, 1)));
        assert!(!lock.release(HolderKind::Insert, Owner::Tx(TransactionId::new(1))));
        assert!(lock.release(HolderKind::Insert, Owner::Sub(stx(1, 1))));
        assert!(lock.snapshot().is_free());
    }

    #[test]
    fn release_removes_one_read_per_call() {
        let lock = Lock::default();
        let owner = Owner::Sub(stx(1, 1));
        lock.try_add_reader(owner);
        lock.try_add_reader(owner);
        assert!(lock.release(HolderKind::Read, owner));
        assert_eq!(lock.snapshot().readers.len(), 1);
    }

    #[test]
    fn surrender_keeps_transaction() {
        let lock = Lock::inserted(Owner::Sub(stx(3, 1)));
        assert!(lock.surrender(HolderKind::Insert, stx(3, 1)));
        let snap = lock.snapshot();
        assert_eq!(snap.insert, Some(Owner::Tx(TransactionId::new(3))));
        assert!(!lock.surrender(HolderKind::Insert, stx(3, 1)));
    }

    #[test]
    fn snapshot_survives_reader_changes() {
        let lock = Lock::default();
        lock.try_add_reader(Owner::Sub(stx(1, 1)));
        let before = lock.snapshot();
        lock.try_add_reader(Owner::Sub(stx(2, 1)));
        assert_eq!(before.readers.len(), 1);
        assert_eq!(lock.snapshot().readers.len(), 2);
    }

    #[test]
    fn exclusive_holder_may_read_its_own_item() {
        let lock = Lock::default();
        assert_eq!(lock.try_set_exclusive(Owner::Sub(stx(1, 1))), Acquire::Granted);

        assert_eq!(lock.try_add_reader(Owner::Sub(stx(1, 2))), Acquire::Granted);
        assert_eq!(
            lock.try_add_reader(Owner::Sub(stx(2, 1))),
            Acquire::Blocked(Owner::Sub(stx(1, 1)))
        );
    }

    #[test]
    fn purged_lock_refuses_holders() {
        let lock = Lock::default();
        lock.purge();
        assert_eq!(lock.try_add_reader(Owner::Sub(stx(1, 1))), Acquire::Gone);
        assert_eq!(lock.try_set_delete(Owner::Sub(stx(1, 1))), Acquire::Gone);
    }

    #[test]
    fn surrendered_owner_covers_siblings() {
        let tx = Owner::Tx(TransactionId::new(1));
        assert!(tx.covers(Owner::Sub(stx(1, 5))));
        assert!(!tx.covers(Owner::Sub(stx(2, 5))));
        assert!(Owner::Sub(stx(1, 1)).covers(Owner::Sub(stx(1, 1))));
        assert!(!Owner::Sub(stx(1, 1)).covers(Owner::Sub(stx(1, 2))));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Step {
            Read(u64),
            Delete(u64),
            Exclusive(u64),
            ReleaseAll(u64),
        }

        fn step_strategy() -> impl Strategy<Value = Step> {
            let txn = 1..=3u64;
            prop_oneof![
                3 => txn.clone().prop_map(Step::Read),
                2 => txn.clone().prop_map(Step::Delete),
                1 => txn.clone().prop_map(Step::Exclusive),
                2 => txn.prop_map(Step::ReleaseAll),
            ]
        }

        fn check(snapshot: &LockSnapshot) -> Result<(), TestCaseError> {
            for holder in [snapshot.delete, snapshot.exclusive].into_iter().flatten() {
                let txn = holder.transaction();
                prop_assert!(snapshot.foreign_reader(txn).is_none());
                prop_assert!(foreign(snapshot.delete, txn).is_none());
                prop_assert!(foreign(snapshot.exclusive, txn).is_none());
            }
            Ok(())
        }

        proptest! {
            #[test]
            fn exclusive_slots_never_shared_across_transactions(
                steps in prop::collection::vec(step_strategy(), 0..48)
            ) {
                let lock = Lock::default();
                for step in steps {
                    match step {
                        Step::Read(t) => {
                            lock.try_add_reader(Owner::Sub(stx(t, 1)));
                        }
                        Step::Delete(t) => {
                            lock.try_set_delete(Owner::Sub(stx(t, 1)));
                        }
                        Step::Exclusive(t) => {
                            lock.try_set_exclusive(Owner::Sub(stx(t, 1)));
                        }
                        Step::ReleaseAll(t) => {
                            let owner = Owner::Sub(stx(t, 1));
                            while lock.release(HolderKind::Read, owner) {}
                            lock.release(HolderKind::Delete, owner);
                            lock.release(HolderKind::Exclusive, owner);
                        }
                    }
                    check(&lock.snapshot())?;
                }
            }
        }
    }
}
