//! Entries: identity, type and payload.

mod entry_type;
mod id;
mod value;

pub use entry_type::{EntryType, ROOT_TYPE};
pub use id::EntryId;
pub use value::Value;

use std::sync::Arc;

/// An entry stored in a container.
///
/// Cloning is cheap: the payload is shared.
#[derive(Debug, Clone)]
pub struct Entry {
    id: EntryId,
    entry_type: EntryType,
    value: Arc<Value>,
}

impl Entry {
    /// Creates an entry of the root type with a fresh ID.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::typed(EntryType::root(), value)
    }

    /// Creates an entry of type `entry_type` with a fresh ID.
    pub fn typed(entry_type: EntryType, value: impl Into<Value>) -> Self {
        Self {
            id: EntryId::new(),
            entry_type,
            value: Arc::new(value.into()),
        }
    }

    /// Returns the entry ID.
    #[must_use]
    pub const fn id(&self) -> EntryId {
        self.id
    }

    /// Returns the entry type.
    #[must_use]
    pub const fn entry_type(&self) -> &EntryType {
        &self.entry_type
    }

    /// Returns the payload.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Shortcut for `self.value().get(property)`.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.value.get(property)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entry {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_compare_by_id() {
        let a = Entry::new(1);
        let b = Entry::new(1);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn untyped_entries_use_root_type() {
        let e = Entry::new("x");
        assert_eq!(e.entry_type().name(), ROOT_TYPE);
    }

    #[test]
    fn property_shortcut() {
        let e = Entry::new(Value::map([("price", Value::from(10))]));
        assert_eq!(e.get("price").and_then(Value::as_integer), Some(10));
    }
}
