//! In-memory repository.
//!
//! Reference implementation of the ordering/snapshot semantics, and the
//! fixture that validates the dispatcher contract in isolation. No failure
//! mode other than programmer error: it never produces `StorageError`.

use std::sync::RwLock;

use async_trait::async_trait;
use harbor_core::{Entity, Id, RepoError, RepoResult};
use indexmap::IndexMap;

use crate::notify::{EntityStore, NotifyingRepository};

/// Process-local ordered entity store.
///
/// Replacing a present key keeps its slot, so an entity's `list()` position
/// is stable across in-place updates; removal shifts later entries down.
pub struct MemoryStore<E: Entity> {
    items: RwLock<IndexMap<Id<E>, E>>,
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self {
        Self {
            items: RwLock::new(IndexMap::new()),
        }
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for MemoryStore<E> {
    fn generate_id(&self) -> Id<E> {
        Id::generate()
    }

    async fn list(&self) -> RepoResult<Vec<E>> {
        let items = self
            .items
            .read()
            .map_err(|_| RepoError::invalid_state("lock poisoned"))?;
        Ok(items.values().cloned().collect())
    }

    async fn find(&self, id: &Id<E>) -> RepoResult<Option<E>> {
        let items = self
            .items
            .read()
            .map_err(|_| RepoError::invalid_state("lock poisoned"))?;
        Ok(items.get(id).cloned())
    }

    async fn do_save(&self, _original: Option<&E>, replacement: &E) -> RepoResult<()> {
        let id = replacement
            .id()
            .cloned()
            .ok_or_else(|| RepoError::invalid_state("store write without an identifier"))?;
        let mut items = self
            .items
            .write()
            .map_err(|_| RepoError::invalid_state("lock poisoned"))?;
        items.insert(id, replacement.clone());
        Ok(())
    }

    async fn do_remove(&self, item: &E) -> RepoResult<bool> {
        let id = item
            .id()
            .ok_or_else(|| RepoError::invalid_state("store delete without an identifier"))?;
        let mut items = self
            .items
            .write()
            .map_err(|_| RepoError::invalid_state("lock poisoned"))?;
        Ok(items.shift_remove(id).is_some())
    }
}

/// Repository backed by a process-local ordered collection.
pub type InMemoryRepository<E> = NotifyingRepository<E, MemoryStore<E>>;
