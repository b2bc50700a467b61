//! In-memory stored map.

use crate::catalog::MapCatalog;
use crate::error::{StorageError, StorageResult};
use crate::map::{StorageTxn, StoredMap};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// An in-memory stored map.
///
/// This map keeps all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Spaces that don't need persistence
///
/// Transaction handles are accepted but ignored: changes are applied
/// immediately and undone by the caller's own rollback logic.
///
/// # Thread Safety
///
/// This map is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use tuplex_storage::{InMemoryStoredMap, StoredMap};
///
/// let map: InMemoryStoredMap<&'static str, i64> = InMemoryStoredMap::new("prices");
/// map.put("apple", 3, None).unwrap();
/// assert_eq!(map.len().unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryStoredMap<K, V> {
    name: String,
    /// `None` once the map was destroyed.
    data: RwLock<Option<HashMap<K, V>>>,
    catalog: Option<Arc<MapCatalog>>,
}

impl<K, V> InMemoryStoredMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates a new empty map that is not tracked by any catalog.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(Some(HashMap::new())),
            catalog: None,
        }
    }

    pub(crate) fn with_catalog(name: String, catalog: Arc<MapCatalog>) -> Self {
        Self {
            name,
            data: RwLock::new(Some(HashMap::new())),
            catalog: Some(catalog),
        }
    }

    fn destroyed(&self) -> StorageError {
        StorageError::destroyed(self.name.clone())
    }
}

impl<K, V> StoredMap<K, V> for InMemoryStoredMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &K) -> StorageResult<Option<V>> {
        let data = self.data.read();
        let map = data.as_ref().ok_or_else(|| self.destroyed())?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: K, value: V, _txn: Option<StorageTxn>) -> StorageResult<Option<V>> {
        let mut data = self.data.write();
        let map = data.as_mut().ok_or_else(|| self.destroyed())?;
        Ok(map.insert(key, value))
    }

    fn remove(&self, key: &K, _txn: Option<StorageTxn>) -> StorageResult<Option<V>> {
        let mut data = self.data.write();
        let map = data.as_mut().ok_or_else(|| self.destroyed())?;
        Ok(map.remove(key))
    }

    fn contains_key(&self, key: &K) -> StorageResult<bool> {
        let data = self.data.read();
        let map = data.as_ref().ok_or_else(|| self.destroyed())?;
        Ok(map.contains_key(key))
    }

    fn len(&self) -> StorageResult<usize> {
        let data = self.data.read();
        let map = data.as_ref().ok_or_else(|| self.destroyed())?;
        Ok(map.len())
    }

    fn keys(&self) -> StorageResult<Vec<K>> {
        let data = self.data.read();
        let map = data.as_ref().ok_or_else(|| self.destroyed())?;
        Ok(map.keys().cloned().collect())
    }

    fn values(&self) -> StorageResult<Vec<V>> {
        let data = self.data.read();
        let map = data.as_ref().ok_or_else(|| self.destroyed())?;
        Ok(map.values().cloned().collect())
    }

    fn clear(&self, _txn: Option<StorageTxn>) -> StorageResult<()> {
        let mut data = self.data.write();
        let map = data.as_mut().ok_or_else(|| self.destroyed())?;
        map.clear();
        Ok(())
    }

    fn destroy(&self) -> StorageResult<()> {
        let was_live = self.data.write().take().is_some();
        if was_live {
            if let Some(catalog) = &self.catalog {
                catalog.forget(&self.name);
            }
        }
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.data.read().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> InMemoryStoredMap<u64, String> {
        InMemoryStoredMap::new("test")
    }

    #[test]
    fn memory_new_is_empty() {
        let map = map();
        assert_eq!(map.len().unwrap(), 0);
        assert!(map.is_empty().unwrap());
        assert_eq!(map.name(), "test");
    }

    #[test]
    fn memory_put_returns_previous() {
        let map = map();
        assert_eq!(map.put(1, "a".into(), None).unwrap(), None);
        assert_eq!(
            map.put(1, "b".into(), Some(StorageTxn::new(7))).unwrap(),
            Some("a".to_string())
        );
        assert_eq!(map.get(&1).unwrap(), Some("b".to_string()));
        assert_eq!(map.len().unwrap(), 1);
    }

    #[test]
    fn memory_remove_returns_value() {
        let map = map();
        map.put(1, "a".into(), None).unwrap();

        assert_eq!(map.remove(&1, None).unwrap(), Some("a".to_string()));
        assert_eq!(map.remove(&1, None).unwrap(), None);
        assert!(!map.contains_key(&1).unwrap());
    }

    #[test]
    fn memory_keys_and_values() {
        let map = map();
        map.put(1, "a".into(), None).unwrap();
        map.put(2, "b".into(), None).unwrap();

        let mut keys = map.keys().unwrap();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2]);

        let mut values = map.values().unwrap();
        values.sort();
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn memory_clear() {
        let map = map();
        map.put(1, "a".into(), None).unwrap();
        map.clear(None).unwrap();
        assert!(map.is_empty().unwrap());
    }

    #[test]
    fn memory_destroy_rejects_further_use() {
        let map = map();
        map.put(1, "a".into(), None).unwrap();
        map.destroy().unwrap();

        assert!(map.is_destroyed());
        assert!(matches!(map.get(&1), Err(StorageError::Destroyed { .. })));
        assert!(matches!(
            map.put(2, "b".into(), None),
            Err(StorageError::Destroyed { .. })
        ));
        assert!(matches!(map.len(), Err(StorageError::Destroyed { .. })));
    }

    #[test]
    fn memory_destroy_twice_is_noop() {
        let map = map();
        map.destroy().unwrap();
        assert!(map.destroy().is_ok());
    }

    #[test]
    fn memory_concurrent_puts() {
        let map = Arc::new(map());
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let map = Arc::clone(&map);
                std::thread::spawn(move || {
                    for i in 0..100u64 {
                        map.put(t * 1000 + i, format!("{t}-{i}"), None).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len().unwrap(), 400);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashMap;

        #[derive(Debug, Clone)]
        enum Op {
            Put(u8, u16),
            Remove(u8),
            Clear,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => (any::<u8>(), any::<u16>()).prop_map(|(k, v)| Op::Put(k, v)),
                2 => any::<u8>().prop_map(Op::Remove),
                1 => Just(Op::Clear),
            ]
        }

        proptest! {
            #[test]
            fn memory_behaves_like_hashmap(ops in prop::collection::vec(op_strategy(), 0..64)) {
                let map: InMemoryStoredMap<u8, u16> = InMemoryStoredMap::new("model");
                let mut model = HashMap::new();
                for op in ops {
                    match op {
                        Op::Put(k, v) => {
                            prop_assert_eq!(map.put(k, v, None).unwrap(), model.insert(k, v));
                        }
                        Op::Remove(k) => {
                            prop_assert_eq!(map.remove(&k, None).unwrap(), model.remove(&k));
                        }
                        Op::Clear => {
                            map.clear(None).unwrap();
                            model.clear();
                        }
                    }
                    prop_assert_eq!(map.len().unwrap(), model.len());
                }
                for (k, v) in &model {
                    prop_assert_eq!(map.get(k).unwrap(), Some(*v));
                }
            }
        }
    }
}
