//! Query predicates and the query execution seam.
//!
//! The query coordinator treats a [`Query`] as an opaque filter and hands
//! candidate entries to a [`QueryEngine`]. Equality hints attached to a
//! query let the coordinator narrow candidates through its property
//! indexes first; the engine still evaluates the full predicate.

mod index;

pub use index::PropertyIndex;

use crate::entry::{Entry, Value};
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

/// A filter over entries.
///
/// # Example
///
/// ```rust
/// use tuplex_core::{Entry, Query, Value};
///
/// let cheap = Query::lt("price", 20).and(Query::eq("item", "apple"));
/// let apple = Entry::new(Value::map([
///     ("price", Value::from(10)),
///     ("item", Value::from("apple")),
/// ]));
/// assert!(cheap.matches(&apple));
/// ```
#[derive(Clone)]
pub struct Query {
    description: String,
    predicate: Predicate,
    equalities: Vec<(String, Value)>,
}

impl Query {
    /// Creates a query from an arbitrary predicate.
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
            equalities: Vec::new(),
        }
    }

    /// Matches every entry.
    #[must_use]
    pub fn all() -> Self {
        Self::new("true", |_| true)
    }

    /// Matches entries whose `property` equals `value`.
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        let property = property.into();
        let value = value.into();
        let mut query = {
            let (p, v) = (property.clone(), value.clone());
            Self::new(format!("{property} == {value:?}"), move |e| {
                e.get(&p) == Some(&v)
            })
        };
        query.equalities.push((property, value));
        query
    }

    /// Matches entries whose integer `property` is below `bound`.
    pub fn lt(property: impl Into<String>, bound: i64) -> Self {
        let property = property.into();
        let description = format!("{property} < {bound}");
        Self::new(description, move |e| {
            e.get(&property)
                .and_then(Value::as_integer)
                .is_some_and(|v| v < bound)
        })
    }

    /// Matches entries whose integer `property` is above `bound`.
    pub fn gt(property: impl Into<String>, bound: i64) -> Self {
        let property = property.into();
        let description = format!("{property} > {bound}");
        Self::new(description, move |e| {
            e.get(&property)
                .and_then(Value::as_integer)
                .is_some_and(|v| v > bound)
        })
    }

    /// Matches entries both queries match.
    #[must_use]
    pub fn and(self, other: Query) -> Self {
        let (left, right) = (self.predicate, other.predicate);
        let mut equalities = self.equalities;
        equalities.extend(other.equalities);
        Self {
            description: format!("({}) && ({})", self.description, other.description),
            predicate: Arc::new(move |e: &Entry| left(e) && right(e)),
            equalities,
        }
    }

    /// Evaluates the query on one entry.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        (self.predicate)(entry)
    }

    /// Equality constraints every match satisfies.
    #[must_use]
    pub fn equalities(&self) -> &[(String, Value)] {
        &self.equalities
    }

    /// Human-readable form of the query.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Query").field(&self.description).finish()
    }
}

/// Executes queries over candidate entries.
///
/// Implementations may return matches lazily; the caller stops pulling
/// once it has enough.
pub trait QueryEngine: Send + Sync + fmt::Debug {
    /// Filters `candidates` down to the entries matching `query`.
    fn execute<'a>(
        &self,
        query: &'a Query,
        candidates: Box<dyn Iterator<Item = Entry> + 'a>,
    ) -> Box<dyn Iterator<Item = Entry> + 'a>;
}

/// Engine that evaluates the query predicate on each candidate in turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateEngine;

impl QueryEngine for PredicateEngine {
    fn execute<'a>(
        &self,
        query: &'a Query,
        candidates: Box<dyn Iterator<Item = Entry> + 'a>,
    ) -> Box<dyn Iterator<Item = Entry> + 'a> {
        Box::new(candidates.filter(move |entry| query.matches(entry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn priced(price: i64) -> Entry {
        Entry::new(Value::map([("price", Value::from(price))]))
    }

    #[test]
    fn comparisons() {
        assert!(Query::lt("price", 20).matches(&priced(10)));
        assert!(!Query::lt("price", 20).matches(&priced(20)));
        assert!(Query::gt("price", 5).matches(&priced(10)));
        assert!(!Query::gt("price", 5).matches(&Entry::new("no map")));
    }

    #[test]
    fn and_collects_equalities() {
        let q = Query::eq("a", 1).and(Query::lt("b", 3)).and(Query::eq("c", "x"));
        let props: Vec<_> = q.equalities().iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(props, vec!["a", "c"]);
    }

    #[test]
    fn predicate_engine_is_lazy() {
        let pulled = Cell::new(0);
        let query = Query::all();
        let candidates = (0..100).map(|i| {
            pulled.set(pulled.get() + 1);
            priced(i)
        });
        let first: Vec<_> = PredicateEngine
            .execute(&query, Box::new(candidates))
            .take(2)
            .collect();
        assert_eq!(first.len(), 2);
        assert_eq!(pulled.get(), 2);
    }

    #[test]
    fn debug_shows_description() {
        assert_eq!(format!("{:?}", Query::lt("price", 20)), "Query(\"price < 20\")");
    }
}
