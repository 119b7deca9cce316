//! Strongly-typed entity identifiers.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Identifier of a stored entity.
///
/// Wraps a string value; the type parameter exists purely so identifiers of
/// unrelated entity kinds cannot be mixed up at compile time. It carries no
/// runtime payload, and equality/hashing consider only the string.
pub struct Id<E: ?Sized> {
    value: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: ?Sized> Id<E> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _entity: PhantomData,
        }
    }

    /// Create a fresh identifier.
    ///
    /// Uses UUIDv7 (time-ordered, 74 random bits), so collisions are
    /// negligible without any inter-process coordination. Prefer passing IDs
    /// explicitly in tests for determinism.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

// Manual impls: derives would put bounds on `E`, which is only a tag.

impl<E: ?Sized> Clone for Id<E> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<E: ?Sized> PartialEq for Id<E> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<E: ?Sized> Eq for Id<E> {}

impl<E: ?Sized> Hash for Id<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<E: ?Sized> fmt::Debug for Id<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<E: ?Sized> fmt::Display for Id<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl<E: ?Sized> From<String> for Id<E> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<E: ?Sized> From<&str> for Id<E> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<E: ?Sized> Serialize for Id<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, E: ?Sized> Deserialize<'de> for Id<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    #[test]
    fn equality_and_hashing_use_the_string_value() {
        use std::collections::HashSet;

        let a: Id<Widget> = Id::new("42");
        let b: Id<Widget> = Id::new("42");
        let c: Id<Widget> = Id::new("43");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }

    #[test]
    fn generate_produces_distinct_values() {
        let a: Id<Widget> = Id::generate();
        let b: Id<Widget> = Id::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_a_bare_string() {
        let id: Id<Widget> = Id::new("abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");

        let back: Id<Widget> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn displays_the_raw_value() {
        let id: Id<Widget> = Id::new("abc");
        assert_eq!(id.to_string(), "abc");
    }
}
