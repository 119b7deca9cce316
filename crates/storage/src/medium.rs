//! Persistent key-value medium interface.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use harbor_core::StorageError;
use serde_json::Value;

/// A persistent key-value space addressed by `(namespace, key)`.
///
/// Each namespace holds one partition's entries. Implementations decide what
/// "persistent" means (a directory of files, a browser-storage shim, a
/// database table); the repository core only relies on this surface.
#[async_trait]
pub trait KeyValueMedium: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StorageError>;

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// All keys currently present in `namespace`.
    async fn keys(&self, namespace: &str) -> Result<Vec<String>, StorageError>;
}

/// In-process medium for tests and callers that want partition semantics
/// without durability.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    namespaces: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueMedium for MemoryMedium {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|_| StorageError::io("lock poisoned"))?;
        Ok(namespaces.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| StorageError::io("lock poisoned"))?;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|_| StorageError::io("lock poisoned"))?;
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|_| StorageError::io("lock poisoned"))?;
        Ok(namespaces
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn namespaces_are_independent() {
        let medium = MemoryMedium::new();
        medium.set("a", "1", json!({"n": 1})).await.unwrap();
        medium.set("b", "1", json!({"n": 2})).await.unwrap();

        assert_eq!(
            medium.get("a", "1").await.unwrap(),
            Some(json!({"n": 1}))
        );
        assert_eq!(
            medium.get("b", "1").await.unwrap(),
            Some(json!({"n": 2}))
        );
        assert_eq!(medium.get("c", "1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_and_keys_round_trip() {
        let medium = MemoryMedium::new();
        medium.set("a", "1", json!(1)).await.unwrap();
        medium.set("a", "2", json!(2)).await.unwrap();
        assert_eq!(medium.keys("a").await.unwrap(), vec!["1", "2"]);

        medium.delete("a", "1").await.unwrap();
        assert_eq!(medium.keys("a").await.unwrap(), vec!["2"]);

        // Deleting an absent key is fine.
        medium.delete("a", "nope").await.unwrap();
        medium.delete("missing-ns", "1").await.unwrap();
    }
}
