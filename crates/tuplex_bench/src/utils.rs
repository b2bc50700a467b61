//! Benchmark utilities.

use rand::Rng;
use tuplex_core::{
    ContainerConfig, ContainerId, CoordinatorConfig, Entry, EntryType, Space, SpaceConfig, Value,
};

/// Seed for random coordinators, so runs are comparable.
pub const BENCH_SEED: u64 = 42;

/// Generate an entry `{ price, item }` with a random price below `max_price`.
pub fn random_priced_entry(max_price: i64) -> Entry {
    let mut rng = rand::thread_rng();
    let price = rng.gen_range(0..max_price);
    Entry::new(Value::map([
        ("price", Value::from(price)),
        ("item", Value::from(format!("item-{price}"))),
    ]))
}

/// Generate a batch of integer entries.
pub fn generate_entries(count: usize) -> Vec<Entry> {
    (0..count).map(|i| Entry::new(i as i64)).collect()
}

/// Generate entries spread over `types`.
pub fn generate_typed_entries(count: usize, types: &[EntryType]) -> Vec<Entry> {
    (0..count)
        .map(|i| Entry::typed(types[i % types.len()].clone(), i as i64))
        .collect()
}

/// A seeded space with one container using `coordinators`.
pub fn space_with(coordinators: Vec<CoordinatorConfig>) -> (Space, ContainerId) {
    let space = Space::new(SpaceConfig::new().random_seed(BENCH_SEED).record_stats(false));
    let config = coordinators
        .into_iter()
        .fold(ContainerConfig::named("bench"), ContainerConfig::coordinator);
    let container = space.create_container(config).unwrap();
    (space, container)
}

/// Writes and commits `entries` in one transaction.
pub fn fill(space: &Space, container: ContainerId, entries: Vec<Entry>) {
    space
        .transaction(|tx| tx.write_all(container, entries))
        .unwrap();
}
