//! Rollback, destruction and implicit transactions.

use proptest::prelude::*;
use tuplex_core::{
    ContainerConfig, ContainerId, CoordinationData, CoordinatorConfig, CoreError, Count, Entry,
    EntryId, LockSnapshot, Selector, TransactionStatus,
};
use tuplex_testkit::{operation_sequence_strategy, PropTestConfig, TestSpace};

/// Everything a rolled-back transaction must leave untouched.
#[derive(Debug, PartialEq)]
struct Observed {
    stored: usize,
    per_coordinator: Vec<(String, usize, bool)>,
    locks: Vec<Option<LockSnapshot>>,
    lock_count: usize,
}

fn observe(space: &TestSpace, c: ContainerId, ids: &[EntryId]) -> Observed {
    let container = space.space.container(c).unwrap();
    let per_coordinator = container
        .coordinators()
        .iter()
        .map(|coord| {
            let all_present = ids.iter().all(|id| coord.contains(*id).unwrap());
            (coord.name().to_string(), coord.len().unwrap(), all_present)
        })
        .collect();
    Observed {
        stored: container.len().unwrap(),
        per_coordinator,
        locks: ids
            .iter()
            .map(|id| space.isolation().entry_lock_snapshot(*id))
            .collect(),
        lock_count: space.isolation().entry_lock_count(),
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    /// Whatever a transaction does, rolling it back restores the container,
    /// its coordinators and the lock table key for key.
    #[test]
    fn rollback_is_a_perfect_inverse(
        ops in operation_sequence_strategy(1, 24),
        committed in 0usize..6,
    ) {
        let space = TestSpace::new();
        let c = space.container(
            "c",
            vec![CoordinatorConfig::random(), CoordinatorConfig::fifo()],
        );
        let ids = space.fill(c, (0..committed).map(|i| i as i64));
        let before = observe(&space, c, &ids);

        let tx = space.begin();
        for op in &ops {
            // Failed operations roll back their own sub-transaction only.
            let _ = op.apply(&tx, c);
        }
        tx.rollback().unwrap();

        prop_assert_eq!(observe(&space, c, &ids), before);
        prop_assert_eq!(space.active_transactions(), 0);
    }

    /// A failing operation leaves the transaction as it was before it.
    #[test]
    fn failed_operation_is_rolled_back_alone(
        ops in operation_sequence_strategy(1, 12),
    ) {
        let space = TestSpace::new();
        let c = space.container(
            "c",
            vec![CoordinatorConfig::random(), CoordinatorConfig::fifo()],
        );
        let tx = space.begin();
        let mut expected = 0usize;
        for op in &ops {
            let before = space.stored(c);
            match op.apply(&tx, c) {
                Ok(_) => expected = space.stored(c),
                Err(_) => {
                    prop_assert_eq!(space.stored(c), before);
                }
            }
        }
        prop_assert_eq!(space.stored(c), expected);
        tx.commit().unwrap();
    }
}

#[test]
fn write_all_is_undone_when_the_container_fills_up() {
    let space = TestSpace::new();
    let c = space
        .create_container(
            ContainerConfig::named("small")
                .coordinator(CoordinatorConfig::fifo())
                .max_size(3),
        )
        .unwrap();

    let tx = space.begin();
    tx.write(c, Entry::new(0)).unwrap();
    let err = tx
        .write_all(c, (1..=3i64).map(Entry::new))
        .unwrap_err();
    assert!(matches!(err, CoreError::ContainerFull { max_size: 3, .. }));
    // The earlier write of the same transaction survives.
    assert_eq!(space.stored(c), 1);
    tx.commit().unwrap();
    assert_eq!(space.read(c, &[Selector::fifo(Count::All)]).unwrap().len(), 1);
}

#[test]
fn implicit_transaction_rolls_back_on_failure() {
    let space = TestSpace::new();
    let c = space.container("keyed", vec![CoordinatorConfig::key()]);

    let err = space.write(c, Entry::new("no key")).unwrap_err();
    assert!(matches!(err, CoreError::MissingCoordinationData { .. }));
    assert_eq!(space.stored(c), 0);
    assert_eq!(space.isolation().entry_lock_count(), 0);

    let stats = space.stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.transactions_aborted, 1);
    assert_eq!(stats.writes, 0);
}

#[test]
fn dropped_transaction_is_rolled_back() {
    let space = TestSpace::new();
    let c = space.container("c", vec![CoordinatorConfig::fifo()]);
    let kept = space.fill(c, ["kept"]);

    {
        let tx = space.begin();
        tx.write(c, Entry::new("lost")).unwrap();
        tx.take(c, &[Selector::fifo(Count::Exact(1))]).unwrap();
        assert_eq!(tx.status(), TransactionStatus::Running);
    }

    assert_eq!(space.active_transactions(), 0);
    let left = space.read(c, &[Selector::fifo(Count::All)]).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id(), kept[0]);
}

#[test]
fn destroy_purges_maps_and_locks() {
    let space = TestSpace::new();
    let c = space.container(
        "doomed",
        vec![CoordinatorConfig::random(), CoordinatorConfig::key()],
    );
    let other = space.container("other", vec![CoordinatorConfig::fifo()]);
    let ids: Vec<EntryId> = (0..3)
        .map(|i| {
            space
                .write_with(c, Entry::new(i), &[CoordinationData::key(format!("k{i}"))])
                .unwrap()
        })
        .collect();
    assert_eq!(space.live_maps().len(), 5);

    space.destroy_container(c).unwrap();

    assert_eq!(
        space.live_maps(),
        ["cnt:2/entries".to_string(), "cnt:2/fifo".to_string()]
    );
    assert!(ids
        .iter()
        .all(|id| space.isolation().entry_lock_snapshot(*id).is_none()));
    assert!(space.isolation().container_lock_snapshot(c).is_none());
    assert!(space.space.container(c).is_none());
    assert!(matches!(
        space.lookup_container("doomed"),
        Err(CoreError::ContainerNotFound { .. })
    ));
    assert!(matches!(
        space.read(c, &[Selector::random(Count::Max)]),
        Err(CoreError::InvalidContainer { .. })
    ));
    assert_eq!(space.lookup_container("other").unwrap(), other);
}

#[test]
fn destroy_purges_pending_entries_of_other_transactions() {
    let space = TestSpace::new();
    let c = space.container("c", vec![CoordinatorConfig::fifo()]);

    let writer = space.begin();
    let pending = writer.write(c, Entry::new("pending")).unwrap();

    space.destroy_container(c).unwrap();
    assert!(space.isolation().entry_lock_snapshot(pending).is_none());

    // Releasing a purged lock is not an error.
    writer.commit().unwrap();
    assert!(space.space.container(c).is_none());
}

#[test]
fn destroy_is_blocked_while_another_transaction_locks_the_container() {
    let space = TestSpace::new();
    let c = space.container("c", vec![CoordinatorConfig::fifo()]);

    let locker = space.begin();
    locker.lock_container(c).unwrap();

    let err = space.destroy_container(c).unwrap_err();
    match err {
        CoreError::ContainerLocked { container, holder } => {
            assert_eq!(container, c);
            assert_eq!(holder.transaction(), locker.id());
        }
        other => panic!("expected ContainerLocked, got {other:?}"),
    }
    locker.commit().unwrap();
    space.destroy_container(c).unwrap();
}

#[test]
fn uncommitted_container_is_invisible_and_name_is_reserved() {
    let space = TestSpace::new();
    let creator = space.begin();
    let c = creator
        .create_container(ContainerConfig::named("fresh").coordinator(CoordinatorConfig::fifo()))
        .unwrap();
    creator.write(c, Entry::new(1)).unwrap();

    assert!(matches!(
        space.lookup_container("fresh"),
        Err(CoreError::ContainerNotFound { .. })
    ));
    assert!(matches!(
        space.create_container(ContainerConfig::named("fresh")),
        Err(CoreError::ContainerNameTaken { .. })
    ));

    creator.rollback().unwrap();
    assert_eq!(space.container_count(), 0);
    assert!(space.live_maps().is_empty());
    space
        .create_container(ContainerConfig::named("fresh"))
        .unwrap();
}
