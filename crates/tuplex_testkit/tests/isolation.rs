//! Lock manager properties: mutual exclusion and holder surrender.

use proptest::prelude::*;
use std::collections::HashMap;
use tuplex_core::{
    Availability, CoreError, EntryId, EntryOperation, IsolationLevel, IsolationManager,
    LockResult, Owner, SubTransactionId, TransactionId,
};
use tuplex_testkit::PropTestConfig;

const RR: IsolationLevel = IsolationLevel::RepeatableRead;

fn stx(txn: u64, seq: u32) -> SubTransactionId {
    SubTransactionId::new(TransactionId::new(txn), seq)
}

/// Installs entries whose writers already committed.
fn committed_entries(manager: &IsolationManager, n: usize) -> Vec<EntryId> {
    (0..n)
        .map(|_| {
            let id = EntryId::new();
            let writer = stx(1_000, 1);
            manager
                .acquire_entry_lock(EntryOperation::Write, id, RR, writer)
                .unwrap();
            manager
                .release_entry_lock(EntryOperation::Write, id, Owner::Sub(writer))
                .unwrap();
            id
        })
        .collect()
}

#[derive(Debug, Clone)]
enum LockStep {
    Read { txn: u64, entry: usize },
    Take { txn: u64, entry: usize },
    Finish { txn: u64 },
}

fn lock_step_strategy(txns: u64, entries: usize) -> impl Strategy<Value = LockStep> {
    prop_oneof![
        3 => (1..=txns, 0..entries).prop_map(|(txn, entry)| LockStep::Read { txn, entry }),
        3 => (1..=txns, 0..entries).prop_map(|(txn, entry)| LockStep::Take { txn, entry }),
        1 => (1..=txns).prop_map(|txn| LockStep::Finish { txn }),
    ]
}

fn assert_exclusive(manager: &IsolationManager, entries: &[EntryId]) -> Result<(), TestCaseError> {
    for id in entries {
        let Some(snapshot) = manager.entry_lock_snapshot(*id) else {
            continue;
        };
        if let Some(deleter) = snapshot.delete {
            prop_assert!(
                snapshot.foreign_reader(deleter.transaction()).is_none(),
                "delete holder {} shares {} with readers {:?}",
                deleter,
                id,
                snapshot.readers
            );
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    /// No entry ever has a delete holder next to a read holder of another
    /// transaction, whatever order transactions read, take and finish in.
    #[test]
    fn delete_and_foreign_read_never_coexist(
        steps in prop::collection::vec(lock_step_strategy(3, 4), 1..60)
    ) {
        let manager = IsolationManager::new();
        let entries = committed_entries(&manager, 4);
        let mut held: HashMap<u64, Vec<(EntryOperation, EntryId)>> = HashMap::new();

        for step in steps {
            match step {
                LockStep::Read { txn, entry } | LockStep::Take { txn, entry } => {
                    let op = if matches!(step, LockStep::Read { .. }) {
                        EntryOperation::Read
                    } else {
                        EntryOperation::Take
                    };
                    let id = entries[entry];
                    match manager.acquire_entry_lock(op, id, RR, stx(txn, 1)) {
                        Ok(LockResult::Granted) => held.entry(txn).or_default().push((op, id)),
                        Ok(LockResult::AlreadyHeld | LockResult::Blocked { .. }) => {}
                        // The transaction already takes the entry.
                        Err(e) => {
                            prop_assert!(matches!(e, CoreError::InvalidEntry { .. }), "unexpected error: {:?}", e);
                        }
                    }
                }
                LockStep::Finish { txn } => {
                    for (op, id) in held.remove(&txn).unwrap_or_default() {
                        manager
                            .release_entry_lock(op, id, Owner::Sub(stx(txn, 1)))
                            .unwrap();
                    }
                }
            }
            assert_exclusive(&manager, &entries)?;
        }
    }
}

#[test]
fn second_insert_on_same_key_is_an_internal_error() {
    let manager = IsolationManager::new();
    let id = EntryId::new();
    manager
        .acquire_entry_lock(EntryOperation::Write, id, RR, stx(1, 1))
        .unwrap();
    let err = manager
        .acquire_entry_lock(EntryOperation::Write, id, RR, stx(2, 1))
        .unwrap_err();
    assert!(err.is_internal());
    assert_eq!(
        manager.entry_lock_snapshot(id).unwrap().insert,
        Some(Owner::Sub(stx(1, 1)))
    );
}

#[test]
fn surrender_keeps_holder_transaction() {
    let manager = IsolationManager::new();
    let id = committed_entries(&manager, 1)[0];
    let first = stx(7, 1);

    manager
        .acquire_entry_lock(EntryOperation::Take, id, RR, first)
        .unwrap();
    manager
        .release_sub_transaction_entry_lock(EntryOperation::Take, id, first)
        .unwrap();

    let holder = manager.entry_lock_snapshot(id).unwrap().delete.unwrap();
    assert_eq!(holder.transaction(), TransactionId::new(7));
    assert_eq!(holder.sub_transaction(), None);
    assert!(holder.is_surrendered());

    // A later sub-transaction of the same transaction sees its own take.
    let later = stx(7, 5);
    assert_eq!(
        manager
            .check_entry_availability(EntryOperation::Take, id, RR, later)
            .unwrap(),
        Availability::NotVisible
    );
    assert!(manager
        .acquire_entry_lock(EntryOperation::Take, id, RR, later)
        .is_err());

    // Other transactions are still blocked by the same holder.
    assert_eq!(
        manager
            .check_entry_availability(EntryOperation::Read, id, RR, stx(8, 1))
            .unwrap(),
        Availability::NotAvailable { holder }
    );

    // Releasing at transaction scope frees the entry.
    manager
        .release_entry_lock(EntryOperation::Take, id, Owner::Tx(TransactionId::new(7)))
        .unwrap();
    assert!(manager.entry_lock_snapshot(id).unwrap().is_free());
}

#[test]
fn surrendered_insert_is_visible_to_own_transaction_only() {
    let manager = IsolationManager::new();
    let id = EntryId::new();
    let writer = stx(3, 1);
    manager
        .acquire_entry_lock(EntryOperation::Write, id, RR, writer)
        .unwrap();
    manager
        .release_sub_transaction_entry_lock(EntryOperation::Write, id, writer)
        .unwrap();

    assert_eq!(
        manager
            .check_entry_availability(EntryOperation::Take, id, RR, stx(3, 2))
            .unwrap(),
        Availability::Available
    );
    assert!(matches!(
        manager
            .check_entry_availability(EntryOperation::Take, id, RR, stx(4, 1))
            .unwrap(),
        Availability::NotAvailable { .. }
    ));
    assert_eq!(
        manager
            .check_entry_availability(
                EntryOperation::Read,
                id,
                IsolationLevel::ReadCommitted,
                stx(4, 1)
            )
            .unwrap(),
        Availability::NotVisible
    );
}
