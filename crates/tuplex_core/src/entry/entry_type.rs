//! Runtime entry types.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Name of the root type every entry created without an explicit type gets.
pub const ROOT_TYPE: &str = "entry";

#[derive(Debug)]
struct TypeNode {
    name: String,
    parent: Option<EntryType>,
}

/// A named entry type with an optional parent type.
///
/// Types form single-inheritance chains: a type coordinator asked for type
/// `A` also selects entries of every type whose chain passes through `A`.
/// Two types are equal when their names are equal.
///
/// ```rust
/// use tuplex_core::EntryType;
///
/// let vehicle = EntryType::new("vehicle");
/// let car = EntryType::subtype("car", &vehicle);
/// assert!(car.is_subtype_of(&vehicle));
/// assert!(!vehicle.is_subtype_of(&car));
/// ```
#[derive(Clone)]
pub struct EntryType(Arc<TypeNode>);

impl EntryType {
    /// Creates a type without a parent.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(TypeNode {
            name: name.into(),
            parent: None,
        }))
    }

    /// Creates a type extending `parent`.
    pub fn subtype(name: impl Into<String>, parent: &EntryType) -> Self {
        Self(Arc::new(TypeNode {
            name: name.into(),
            parent: Some(parent.clone()),
        }))
    }

    /// The root type.
    #[must_use]
    pub fn root() -> Self {
        Self::new(ROOT_TYPE)
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the parent type, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&EntryType> {
        self.0.parent.as_ref()
    }

    /// Returns true if `self` is `other` or extends it, directly or not.
    #[must_use]
    pub fn is_subtype_of(&self, other: &EntryType) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty == other {
                return true;
            }
            current = ty.parent();
        }
        false
    }
}

impl PartialEq for EntryType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for EntryType {}

impl Hash for EntryType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryType({})", self.0.name)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_chain_is_transitive() {
        let a = EntryType::new("a");
        let b = EntryType::subtype("b", &a);
        let c = EntryType::subtype("c", &b);
        assert!(c.is_subtype_of(&a));
        assert!(c.is_subtype_of(&b));
        assert!(c.is_subtype_of(&c));
    }

    #[test]
    fn siblings_are_unrelated() {
        let a = EntryType::new("a");
        let b = EntryType::subtype("b", &a);
        let c = EntryType::subtype("c", &a);
        assert!(!b.is_subtype_of(&c));
        assert!(!c.is_subtype_of(&b));
    }

    #[test]
    fn equality_by_name() {
        assert_eq!(EntryType::new("x"), EntryType::new("x"));
        assert_ne!(EntryType::new("x"), EntryType::new("y"));
        assert_eq!(EntryType::root().name(), ROOT_TYPE);
    }
}
