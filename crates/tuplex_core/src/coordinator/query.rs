//! Query coordinator.

use super::{mismatch, CoordinationData, Coordinator, CoordinatorKind, EntryMap};
use crate::entry::{Entry, EntryId, Value};
use crate::error::CoreResult;
use crate::isolation::IsolationManager;
use crate::query::{PropertyIndex, Query, QueryEngine};
use crate::selector::{ChainSelector, EntrySelector, SelectionStrategy, Selector, SelectorKind};
use crate::types::SubTransactionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use tuplex_storage::StorageTxn;

/// Selects entries matching a [`Query`].
///
/// Indexed properties narrow the candidate set when a query carries an
/// equality hint on one of them. The query engine always evaluates the
/// whole predicate on the remaining candidates.
pub struct QueryCoordinator {
    name: String,
    entries: EntryMap,
    engine: Arc<dyn QueryEngine>,
    indexes: RwLock<HashMap<String, PropertyIndex>>,
    /// Indexed property values of each registered entry.
    derived: RwLock<HashMap<EntryId, Vec<(String, Value)>>>,
}

impl QueryCoordinator {
    /// Creates a coordinator indexing `indexed_properties`.
    pub fn new<I>(
        name: impl Into<String>,
        entries: EntryMap,
        engine: Arc<dyn QueryEngine>,
        indexed_properties: I,
    ) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let indexes = indexed_properties
            .into_iter()
            .map(|p| (p.clone(), PropertyIndex::new(p)))
            .collect();
        Self {
            name: name.into(),
            entries,
            engine,
            indexes: RwLock::new(indexes),
            derived: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the indexed property names, sorted.
    #[must_use]
    pub fn indexed_properties(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the cached indexed property values of a registered entry.
    #[must_use]
    pub fn derived_properties(&self, entry: EntryId) -> Option<Vec<(String, Value)>> {
        self.derived.read().get(&entry).cloned()
    }

    /// Entries an index maps the query's equality hints to, or `None` if no
    /// hint is on an indexed property.
    fn indexed_candidates(&self, query: &Query) -> Option<Vec<EntryId>> {
        let indexes = self.indexes.read();
        query.equalities().iter().find_map(|(property, value)| {
            indexes.get(property).map(|index| index.lookup(value))
        })
    }

    fn matching(&self, query: &Query) -> CoreResult<Vec<Entry>> {
        let candidates = match self.indexed_candidates(query) {
            Some(ids) => {
                trace!(coordinator = %self.name, hits = ids.len(), "index narrowed query");
                self.entries.resolve(ids)?
            }
            None => {
                let mut all = self.entries.entries()?;
                all.sort_by_key(Entry::id);
                all
            }
        };
        Ok(self
            .engine
            .execute(query, Box::new(candidates.into_iter()))
            .collect())
    }
}

impl fmt::Debug for QueryCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCoordinator")
            .field("name", &self.name)
            .field("entries", &self.entries)
            .field("engine", &self.engine)
            .field("indexed", &self.indexed_properties())
            .finish_non_exhaustive()
    }
}

impl Coordinator for QueryCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CoordinatorKind {
        CoordinatorKind::Query
    }

    fn register_entry(
        &self,
        stx: SubTransactionId,
        _data: &[CoordinationData],
        entry: &Entry,
        _isolation: &IsolationManager,
    ) -> CoreResult<()> {
        if !self.entries.insert(entry, Some(stx.storage_txn()))? {
            return Ok(());
        }
        let mut derived = Vec::new();
        for (property, index) in self.indexes.write().iter_mut() {
            if let Some(value) = entry.get(property) {
                index.insert(value.clone(), entry.id());
                derived.push((property.clone(), value.clone()));
            }
        }
        self.derived.write().insert(entry.id(), derived);
        Ok(())
    }

    fn unregister_entry(&self, entry: EntryId, txn: Option<StorageTxn>) -> CoreResult<bool> {
        if self.entries.remove(entry, txn)?.is_none() {
            return Ok(false);
        }
        let derived = self.derived.write().remove(&entry);
        if let Some(derived) = derived {
            let mut indexes = self.indexes.write();
            for (property, value) in &derived {
                if let Some(index) = indexes.get_mut(property) {
                    index.remove(value, entry);
                }
            }
        }
        Ok(true)
    }

    fn contains(&self, entry: EntryId) -> CoreResult<bool> {
        self.entries.contains(entry)
    }

    fn len(&self) -> CoreResult<usize> {
        self.entries.len()
    }

    fn destroy(&self) -> CoreResult<()> {
        self.indexes.write().values_mut().for_each(PropertyIndex::clear);
        self.derived.write().clear();
        self.entries.destroy()
    }

    fn create_selector(
        self: Arc<Self>,
        selector: &Selector,
        predecessor: Option<Box<dyn EntrySelector>>,
    ) -> CoreResult<Box<dyn EntrySelector>> {
        match selector.kind() {
            SelectorKind::Query(query) => Ok(Box::new(ChainSelector::new(
                QueryStrategy {
                    query: query.clone(),
                    coordinator: self,
                },
                selector.count(),
                predecessor,
            ))),
            _ => Err(mismatch(&*self, selector)),
        }
    }
}

struct QueryStrategy {
    coordinator: Arc<QueryCoordinator>,
    query: Query,
}

impl SelectionStrategy for QueryStrategy {
    fn candidates(&mut self) -> CoreResult<Vec<Entry>> {
        self.coordinator.matching(&self.query)
    }

    fn admits(&self, entry: &Entry) -> CoreResult<bool> {
        self.coordinator.contains(entry.id())
    }

    fn refine<'s>(
        &'s self,
        admitted: Box<dyn Iterator<Item = Entry> + 's>,
    ) -> Box<dyn Iterator<Item = Entry> + 's> {
        self.coordinator.engine.execute(&self.query, admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AllowAll;
    use crate::coordinator::test_support::{commit_write, stx, take_ctx};
    use crate::error::CoreError;
    use crate::query::PredicateEngine;
    use crate::selector::Count;
    use tuplex_storage::InMemoryStoredMap;

    fn coordinator() -> Arc<QueryCoordinator> {
        Arc::new(QueryCoordinator::new(
            "query",
            EntryMap::new(InMemoryStoredMap::new("q")),
            Arc::new(PredicateEngine),
            ["item".to_string()],
        ))
    }

    fn item(name: &str, price: i64) -> Entry {
        Entry::new(Value::map([
            ("item", Value::from(name)),
            ("price", Value::from(price)),
        ]))
    }

    fn register(c: &QueryCoordinator, isolation: &IsolationManager, entry: &Entry) {
        commit_write(isolation, entry);
        c.register_entry(stx(100), &[], entry, isolation).unwrap();
    }

    #[test]
    fn predicate_filters_candidates() {
        let isolation = IsolationManager::new();
        let c = coordinator();
        for (name, price) in [("apple", 10), ("pear", 25), ("plum", 15)] {
            register(&c, &isolation, &item(name, price));
        }

        let mut selector = c
            .create_selector(&Selector::query(Query::lt("price", 20), Count::Max), None)
            .unwrap();
        let cheap = selector.get_all(&take_ctx(&isolation, &AllowAll)).unwrap();
        assert_eq!(cheap.len(), 2);
    }

    #[test]
    fn index_narrows_but_predicate_still_applies() {
        let isolation = IsolationManager::new();
        let c = coordinator();
        register(&c, &isolation, &item("apple", 10));
        register(&c, &isolation, &item("apple", 30));
        register(&c, &isolation, &item("pear", 10));

        let query = Query::eq("item", "apple").and(Query::lt("price", 20));
        assert_eq!(c.indexed_candidates(&query).map(|ids| ids.len()), Some(2));

        let found = c.matching(&query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("price"), Some(&Value::from(10)));
    }

    #[test]
    fn unregister_cleans_index_and_cache() {
        let isolation = IsolationManager::new();
        let c = coordinator();
        let apple = item("apple", 10);
        register(&c, &isolation, &apple);
        assert_eq!(
            c.derived_properties(apple.id()),
            Some(vec![("item".to_string(), Value::from("apple"))])
        );

        assert!(c.unregister_entry(apple.id(), None).unwrap());
        assert_eq!(c.derived_properties(apple.id()), None);
        assert_eq!(
            c.indexed_candidates(&Query::eq("item", "apple")),
            Some(Vec::new())
        );
    }

    #[test]
    fn exact_count_short_of_matches() {
        let isolation = IsolationManager::new();
        let c = coordinator();
        register(&c, &isolation, &item("apple", 10));

        let mut selector = c
            .create_selector(&Selector::query(Query::all(), Count::Exact(2)), None)
            .unwrap();
        let result = selector.get_all(&take_ctx(&isolation, &AllowAll));
        assert!(matches!(result, Err(CoreError::CountNotMet { .. })));
    }
}
