//! JSON-file-backed key-value medium.
//!
//! One JSON object file per namespace under a root directory. Suited to
//! desktop/client use where entity counts are small; every write rewrites
//! the namespace file.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use harbor_core::StorageError;
use serde_json::{Map, Value};

use crate::medium::KeyValueMedium;

pub struct JsonFileMedium {
    root: PathBuf,
}

impl JsonFileMedium {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A medium rooted at `{app_data_dir}/{app}/partitions`.
    pub fn in_app_data(app: &str) -> anyhow::Result<Self> {
        let base = dirs::data_dir()
            .or_else(|| {
                dirs::home_dir().map(|mut h| {
                    h.push(".local");
                    h.push("share");
                    h
                })
            })
            .context("failed to resolve OS app data directory")?;

        let mut root = base;
        root.push(app);
        root.push("partitions");
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.root.join(format!("{namespace}.json"))
    }

    async fn read_namespace(&self, namespace: &str) -> Result<Map<String, Value>, StorageError> {
        let path = self.namespace_path(namespace);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(StorageError::io(format!("read {path:?}: {err}"))),
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(StorageError::codec(format!(
                "{path:?}: expected a JSON object, found {other}"
            ))),
            Err(err) => Err(StorageError::codec(format!("{path:?}: {err}"))),
        }
    }

    async fn write_namespace(
        &self,
        namespace: &str,
        entries: Map<String, Value>,
    ) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| StorageError::io(format!("create {:?}: {err}", self.root)))?;

        let path = self.namespace_path(namespace);
        let bytes = serde_json::to_vec(&Value::Object(entries))
            .map_err(|err| StorageError::codec(err.to_string()))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| StorageError::io(format!("write {path:?}: {err}")))
    }
}

#[async_trait]
impl KeyValueMedium for JsonFileMedium {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.read_namespace(namespace).await?.get(key).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let mut entries = self.read_namespace(namespace).await?;
        entries.insert(key.to_string(), value);
        self.write_namespace(namespace, entries).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut entries = self.read_namespace(namespace).await?;
        if entries.remove(key).is_some() {
            self.write_namespace(namespace, entries).await?;
        }
        Ok(())
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .read_namespace(namespace)
            .await?
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn scratch_medium() -> JsonFileMedium {
        let root = std::env::temp_dir()
            .join("harbor-json-medium-tests")
            .join(uuid::Uuid::now_v7().to_string());
        JsonFileMedium::new(root)
    }

    #[tokio::test]
    async fn missing_namespace_reads_as_empty() {
        let medium = scratch_medium();
        assert_eq!(medium.get("a", "1").await.unwrap(), None);
        assert!(medium.keys("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entries_survive_a_new_medium_instance() {
        let medium = scratch_medium();
        medium.set("a", "1", json!({"name": "A"})).await.unwrap();
        medium.set("a", "2", json!({"name": "B"})).await.unwrap();

        let reopened = JsonFileMedium::new(medium.root().clone());
        assert_eq!(
            reopened.get("a", "1").await.unwrap(),
            Some(json!({"name": "A"}))
        );
        assert_eq!(reopened.keys("a").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_rewrites_the_namespace_file() {
        let medium = scratch_medium();
        medium.set("a", "1", json!(1)).await.unwrap();
        medium.set("a", "2", json!(2)).await.unwrap();

        medium.delete("a", "1").await.unwrap();
        assert_eq!(medium.get("a", "1").await.unwrap(), None);
        assert_eq!(medium.keys("a").await.unwrap(), vec!["2"]);
    }
}
