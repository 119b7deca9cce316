//! Partitioned persistent repository.
//!
//! Routes each entity to one of several named partitions (each an
//! independent namespace of the key-value medium) via a chooser function.
//! The active partition set can change at runtime, which replays visibility
//! events instead of save/remove events: deactivation hides entities without
//! deleting them.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use harbor_core::{Entity, Id, RepoError, RepoResult, StorageError};
use harbor_repository::{EntityStore, Notifier, NotifyingRepository};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::medium::KeyValueMedium;

/// Picks the partition an entity belongs to. Must be a pure function of the
/// entity's value.
pub type PartitionChooser<E> = Arc<dyn Fn(&E) -> String + Send + Sync>;

/// Entity store sharding across named partitions of a key-value medium.
///
/// Each partition's `Id → entity` map is materialized from the medium on
/// first access and cached for the store's lifetime; the cache mutex also
/// serializes materialization.
pub struct PartitionedStore<E: Entity + Serialize + DeserializeOwned> {
    medium: Arc<dyn KeyValueMedium>,
    chooser: PartitionChooser<E>,
    active: RwLock<IndexSet<String>>,
    partitions: Mutex<HashMap<String, IndexMap<Id<E>, E>>>,
}

impl<E: Entity + Serialize + DeserializeOwned> PartitionedStore<E> {
    pub fn new(
        medium: Arc<dyn KeyValueMedium>,
        active: impl IntoIterator<Item = impl Into<String>>,
        chooser: impl Fn(&E) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            medium,
            chooser: Arc::new(chooser),
            active: RwLock::new(active.into_iter().map(Into::into).collect()),
            partitions: Mutex::new(HashMap::new()),
        }
    }

    /// Store with a single fixed partition.
    pub fn single(medium: Arc<dyn KeyValueMedium>, partition: impl Into<String>) -> Self {
        let key = partition.into();
        let chooser_key = key.clone();
        Self::new(medium, [key], move |_| chooser_key.clone())
    }

    /// The currently active partition keys, in activation order.
    pub fn active_partitions(&self) -> RepoResult<IndexSet<String>> {
        self.active
            .read()
            .map(|keys| keys.clone())
            .map_err(|_| RepoError::invalid_state("lock poisoned"))
    }

    async fn load_partition(&self, key: &str) -> RepoResult<IndexMap<Id<E>, E>> {
        let mut map = IndexMap::new();
        for k in self.medium.keys(key).await? {
            if let Some(raw) = self.medium.get(key, &k).await? {
                let item: E = serde_json::from_value(raw)
                    .map_err(|err| StorageError::codec(err.to_string()))?;
                map.insert(Id::new(k), item);
            }
        }
        Ok(map)
    }

    /// Read-through to the cached partition map, materializing on first use.
    async fn partition<'c>(
        &self,
        cache: &'c mut HashMap<String, IndexMap<Id<E>, E>>,
        key: &str,
    ) -> RepoResult<&'c mut IndexMap<Id<E>, E>> {
        match cache.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(self.load_partition(key).await?)),
        }
    }

    fn encode(item: &E) -> RepoResult<Value> {
        serde_json::to_value(item)
            .map_err(|err| StorageError::codec(err.to_string()).into())
    }

    /// Change the active partition set, replaying visibility events through
    /// `notifier`.
    ///
    /// Deactivated partitions announce `visible = false` for every entity
    /// currently materialized in them; activated partitions are materialized
    /// and announce `visible = true`. No save/remove events fire, and nothing
    /// is deleted from the medium.
    pub async fn set_active_partitions(
        &self,
        new_keys: IndexSet<String>,
        notifier: &Notifier<E>,
    ) -> RepoResult<()> {
        let old_keys = self.active_partitions()?;
        let mut cache = self.partitions.lock().await;

        for key in old_keys.iter().filter(|k| !new_keys.contains(*k)) {
            if let Some(partition) = cache.get(key) {
                let items: Vec<E> = partition.values().cloned().collect();
                notifier.visibility_changed(&items, false).await;
            }
        }

        for key in new_keys.iter().filter(|k| !old_keys.contains(*k)) {
            let partition = self.partition(&mut cache, key).await?;
            let items: Vec<E> = partition.values().cloned().collect();
            notifier.visibility_changed(&items, true).await;
        }

        *self
            .active
            .write()
            .map_err(|_| RepoError::invalid_state("lock poisoned"))? = new_keys;
        Ok(())
    }

    /// Bulk hydration: replace everything visible with the decoded items.
    ///
    /// Ordering contract: removal hooks fire before insertion hooks, but all
    /// storage writes land between them, so a listener re-querying `list()`
    /// from `on_removed` observes the new state rather than an empty one.
    pub async fn replace_all(
        &self,
        raw_items: Vec<Value>,
        notifier: &Notifier<E>,
    ) -> RepoResult<()> {
        // Decode and group by target partition, preserving input order.
        let mut groups: IndexMap<String, Vec<(Id<E>, E)>> = IndexMap::new();
        for raw in raw_items {
            let item: E = serde_json::from_value(raw)
                .map_err(|err| StorageError::codec(err.to_string()))?;
            let id = item
                .id()
                .cloned()
                .ok_or_else(|| RepoError::invalid_state("hydrated item carries no identifier"))?;
            groups.entry((self.chooser)(&item)).or_default().push((id, item));
        }
        let new_items: Vec<E> = groups
            .values()
            .flat_map(|group| group.iter().map(|(_, item)| item.clone()))
            .collect();

        let prior = self.list().await?;
        notifier.before_removing_bulk(&prior).await;

        let active = self.active_partitions()?;
        {
            let mut cache = self.partitions.lock().await;
            for key in &active {
                for k in self.medium.keys(key).await? {
                    self.medium.delete(key, &k).await?;
                }
                self.partition(&mut cache, key).await?.clear();
            }
        }

        notifier.before_saving_bulk(&new_items).await;

        {
            let mut cache = self.partitions.lock().await;
            for (key, group) in &groups {
                for (id, item) in group {
                    self.medium.set(key, id.as_str(), Self::encode(item)?).await?;
                }
                let partition = self.partition(&mut cache, key).await?;
                for (id, item) in group {
                    partition.insert(id.clone(), item.clone());
                }
            }
        }

        notifier.on_removed_bulk(&prior).await;
        notifier.on_saved_bulk(&new_items).await;
        Ok(())
    }
}

#[async_trait]
impl<E: Entity + Serialize + DeserializeOwned> EntityStore<E> for PartitionedStore<E> {
    fn generate_id(&self) -> Id<E> {
        Id::generate()
    }

    async fn list(&self) -> RepoResult<Vec<E>> {
        let active = self.active_partitions()?;
        let mut cache = self.partitions.lock().await;
        let mut items = Vec::new();
        for key in &active {
            items.extend(self.partition(&mut cache, key).await?.values().cloned());
        }
        Ok(items)
    }

    async fn find(&self, id: &Id<E>) -> RepoResult<Option<E>> {
        let active = self.active_partitions()?;
        let mut cache = self.partitions.lock().await;
        for key in &active {
            if let Some(item) = self.partition(&mut cache, key).await?.get(id) {
                return Ok(Some(item.clone()));
            }
        }
        Ok(None)
    }

    async fn do_save(&self, original: Option<&E>, replacement: &E) -> RepoResult<()> {
        let id = replacement
            .id()
            .cloned()
            .ok_or_else(|| RepoError::invalid_state("store write without an identifier"))?;
        let replacement_key = (self.chooser)(replacement);
        tracing::debug!(id = %id, partition = %replacement_key, "saving entity");

        let mut cache = self.partitions.lock().await;

        // An entity whose value now routes elsewhere moves partitions: the
        // old entry is deleted before the new one lands.
        if let Some(original) = original {
            let original_key = (self.chooser)(original);
            if original_key != replacement_key {
                if let Some(original_id) = original.id() {
                    self.medium.delete(&original_key, original_id.as_str()).await?;
                    self.partition(&mut cache, &original_key)
                        .await?
                        .shift_remove(original_id);
                }
            }
        }

        self.medium
            .set(&replacement_key, id.as_str(), Self::encode(replacement)?)
            .await?;
        self.partition(&mut cache, &replacement_key)
            .await?
            .insert(id, replacement.clone());
        Ok(())
    }

    async fn do_remove(&self, item: &E) -> RepoResult<bool> {
        let id = item
            .id()
            .ok_or_else(|| RepoError::invalid_state("store delete without an identifier"))?;
        let key = (self.chooser)(item);

        let mut cache = self.partitions.lock().await;
        let partition = self.partition(&mut cache, &key).await?;
        if !partition.contains_key(id) {
            return Ok(false);
        }

        self.medium.delete(&key, id.as_str()).await?;
        self.partition(&mut cache, &key).await?.shift_remove(id);
        tracing::debug!(id = %id, partition = %key, "removed entity");
        Ok(true)
    }
}

/// Repository sharding across named partitions of a persistent medium.
pub type PartitionedRepository<E> = NotifyingRepository<E, PartitionedStore<E>>;

/// Partition operations exposed on [`PartitionedRepository`].
#[async_trait]
pub trait PartitionedOps<E: Entity + Serialize + DeserializeOwned> {
    /// Change which partitions are visible; see
    /// [`PartitionedStore::set_active_partitions`].
    async fn set_active_partitions(&self, new_keys: IndexSet<String>) -> RepoResult<()>;

    /// Bulk hydration from raw medium representations; see
    /// [`PartitionedStore::replace_all`].
    async fn replace_all(&self, raw_items: Vec<Value>) -> RepoResult<()>;

    fn active_partitions(&self) -> RepoResult<IndexSet<String>>;
}

#[async_trait]
impl<E: Entity + Serialize + DeserializeOwned> PartitionedOps<E> for PartitionedRepository<E> {
    async fn set_active_partitions(&self, new_keys: IndexSet<String>) -> RepoResult<()> {
        self.store()
            .set_active_partitions(new_keys, self.notifier())
            .await
    }

    async fn replace_all(&self, raw_items: Vec<Value>) -> RepoResult<()> {
        self.store().replace_all(raw_items, self.notifier()).await
    }

    fn active_partitions(&self) -> RepoResult<IndexSet<String>> {
        self.store().active_partitions()
    }
}
