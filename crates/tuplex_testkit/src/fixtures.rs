//! Test fixtures and space helpers.
//!
//! Provides convenience functions for setting up test spaces
//! and common test scenarios.

use tuplex_core::{
    ContainerConfig, ContainerId, CoordinatorConfig, Entry, EntryId, Space, SpaceConfig,
};

/// Seed used by [`TestSpace::new`], so random selection is reproducible.
pub const TEST_SEED: u64 = 0x5eed;

/// A space with deterministic random coordinators.
pub struct TestSpace {
    /// The space instance.
    pub space: Space,
}

impl TestSpace {
    /// Creates a space seeded with [`TEST_SEED`].
    pub fn new() -> Self {
        Self::with_config(SpaceConfig::new().random_seed(TEST_SEED))
    }

    /// Creates a space from `config`.
    pub fn with_config(config: SpaceConfig) -> Self {
        Self {
            space: Space::new(config),
        }
    }

    /// Creates a committed container with the given coordinators.
    pub fn container(&self, name: &str, coordinators: Vec<CoordinatorConfig>) -> ContainerId {
        let config = coordinators
            .into_iter()
            .fold(ContainerConfig::named(name), ContainerConfig::coordinator);
        self.space
            .create_container(config)
            .expect("Failed to create container")
    }

    /// Writes and commits one entry per value.
    pub fn fill<I, V>(&self, container: ContainerId, values: I) -> Vec<EntryId>
    where
        I: IntoIterator<Item = V>,
        V: Into<tuplex_core::Value>,
    {
        let entries: Vec<Entry> = values.into_iter().map(Entry::new).collect();
        self.space
            .transaction(|tx| tx.write_all(container, entries))
            .expect("Failed to write entries")
    }

    /// Number of committed entries in a container, as its store sees them.
    pub fn stored(&self, container: ContainerId) -> usize {
        self.space
            .container(container)
            .expect("Container should exist")
            .len()
            .expect("Failed to count entries")
    }

    /// Names of the stored maps that are still alive, sorted.
    pub fn live_maps(&self) -> Vec<String> {
        self.space.catalog().names()
    }
}

impl Default for TestSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestSpace {
    type Target = Space;

    fn deref(&self) -> &Self::Target {
        &self.space
    }
}

/// Runs a test with a fresh seeded space.
///
/// # Example
///
/// ```rust
/// use tuplex_testkit::with_space;
///
/// with_space(|space| {
///     assert_eq!(space.container_count(), 0);
/// });
/// ```
pub fn with_space<F, R>(f: F) -> R
where
    F: FnOnce(&Space) -> R,
{
    let test_space = TestSpace::new();
    f(&test_space.space)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use tuplex_core::{EntryType, Value};

    /// A small type hierarchy: `shape` with subtypes `circle` and `square`,
    /// plus an unrelated `colour`.
    #[derive(Debug, Clone)]
    pub struct Shapes {
        /// Base type.
        pub shape: EntryType,
        /// Subtype of `shape`.
        pub circle: EntryType,
        /// Sibling of `circle`.
        pub square: EntryType,
        /// Unrelated root type.
        pub colour: EntryType,
    }

    impl Shapes {
        /// Builds the hierarchy.
        pub fn new() -> Self {
            let shape = EntryType::new("shape");
            let circle = EntryType::subtype("circle", &shape);
            let square = EntryType::subtype("square", &shape);
            Self {
                shape,
                circle,
                square,
                colour: EntryType::new("colour"),
            }
        }
    }

    impl Default for Shapes {
        fn default() -> Self {
            Self::new()
        }
    }

    /// An entry `{ price: n }`.
    pub fn priced(price: i64) -> Entry {
        Entry::new(Value::map([("price", Value::from(price))]))
    }

    /// A container with a random coordinator holding `count` committed
    /// integer entries.
    pub fn populated_space(count: usize) -> (TestSpace, ContainerId) {
        let space = TestSpace::new();
        let container = space.container("items", vec![CoordinatorConfig::random()]);
        space.fill(container, (0..count).map(|i| i as i64));
        (space, container)
    }

    /// A container with a query coordinator indexing `price`.
    pub fn priced_space(prices: &[i64]) -> (TestSpace, ContainerId) {
        let space = TestSpace::new();
        let container = space.container(
            "priced",
            vec![CoordinatorConfig::fifo(), CoordinatorConfig::query(["price"])],
        );
        let entries: Vec<Entry> = prices.iter().copied().map(priced).collect();
        space
            .transaction(|tx| tx.write_all(container, entries))
            .expect("Failed to write entries");
        (space, container)
    }
}
