//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entries, counts and operation
//! sequences against a space.

use proptest::prelude::*;
use tuplex_core::{ContainerId, CoreResult, Count, Entry, Selector, SpaceTxn, Value};

/// Strategy for scalar values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-z]{0,12}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

/// Strategy for values nested up to three levels deep.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for untyped entries with fresh IDs.
pub fn entry_strategy() -> impl Strategy<Value = Entry> {
    value_strategy().prop_map(Entry::new)
}

/// Strategy for entries `{ price: n }`.
pub fn priced_entry_strategy(prices: std::ops::Range<i64>) -> impl Strategy<Value = Entry> {
    prices.prop_map(|price| Entry::new(Value::map([("price", Value::from(price))])))
}

/// Strategy for selector counts.
pub fn count_strategy(max_exact: usize) -> impl Strategy<Value = Count> {
    prop_oneof![
        4 => (1..=max_exact.max(1)).prop_map(Count::Exact),
        1 => Just(Count::All),
        2 => Just(Count::Max),
    ]
}

/// One operation of a generated workload.
#[derive(Debug, Clone)]
pub enum SpaceOperation {
    /// Write an entry.
    Write {
        /// Entry value.
        value: Value,
    },
    /// Read with a fifo selector.
    Read {
        /// Selector count.
        count: Count,
    },
    /// Take with a random selector.
    Take {
        /// Selector count.
        count: Count,
    },
    /// Delete with a fifo selector.
    Delete {
        /// Selector count.
        count: Count,
    },
}

impl SpaceOperation {
    /// Runs the operation in `tx`. Returns how many entries it touched.
    ///
    /// Expects the container to have a random and a fifo coordinator.
    ///
    /// # Errors
    ///
    /// Whatever the space operation returns.
    pub fn apply(&self, tx: &SpaceTxn<'_>, container: ContainerId) -> CoreResult<usize> {
        match self {
            Self::Write { value } => tx.write(container, Entry::new(value.clone())).map(|_| 1),
            Self::Read { count } => tx
                .read(container, &[Selector::fifo(*count)])
                .map(|entries| entries.len()),
            Self::Take { count } => tx
                .take(container, &[Selector::random(*count)])
                .map(|entries| entries.len()),
            Self::Delete { count } => tx.delete(container, &[Selector::fifo(*count)]),
        }
    }
}

/// Strategy for generating space operations.
pub fn space_operation_strategy() -> impl Strategy<Value = SpaceOperation> {
    prop_oneof![
        3 => scalar_value_strategy().prop_map(|value| SpaceOperation::Write { value }),
        2 => count_strategy(3).prop_map(|count| SpaceOperation::Read { count }),
        2 => count_strategy(3).prop_map(|count| SpaceOperation::Take { count }),
        1 => count_strategy(2).prop_map(|count| SpaceOperation::Delete { count }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<SpaceOperation>> {
    prop::collection::vec(space_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
