//! Notification dispatch around storage writes.
//!
//! Every concrete repository is a [`NotifyingRepository`] over some
//! [`EntityStore`]: the dispatcher owns no-op detection and the
//! before-hooks → write → after-hooks sequencing, the store owns the actual
//! collection or medium operations.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use harbor_core::{Entity, Id, RepoResult};

use crate::contract::Repository;
use crate::listener::{ErrorSink, RepositoryListener, tracing_error_sink};

/// Registered listeners plus the sink their failures are reported to.
///
/// Dispatch is sequential in registration order. The listener list is
/// snapshotted before each dispatch, so removing a listener takes effect for
/// every dispatch that starts afterwards.
pub struct Notifier<E: Entity> {
    listeners: Mutex<Vec<Arc<dyn RepositoryListener<E>>>>,
    sink: ErrorSink,
}

impl<E: Entity> Notifier<E> {
    pub fn new(sink: ErrorSink) -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            sink,
        }
    }

    pub fn add(&self, listener: Arc<dyn RepositoryListener<E>>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }

    pub fn remove(&self, listener: &Arc<dyn RepositoryListener<E>>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn RepositoryListener<E>>> {
        self.listeners.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn report(&self, err: &anyhow::Error) {
        (self.sink)(err);
    }

    pub async fn before_saving(&self, original: Option<&E>, replacement: &E) {
        for listener in self.snapshot() {
            if let Err(err) = listener.before_saving(original, replacement).await {
                self.report(&err);
            }
        }
    }

    pub async fn on_saved(&self, original: Option<&E>, replacement: &E) {
        for listener in self.snapshot() {
            if let Err(err) = listener.on_saved(original, replacement).await {
                self.report(&err);
            }
        }
    }

    pub async fn before_removing(&self, item: &E) {
        for listener in self.snapshot() {
            if let Err(err) = listener.before_removing(item).await {
                self.report(&err);
            }
        }
    }

    pub async fn on_removed(&self, item: &E) {
        for listener in self.snapshot() {
            if let Err(err) = listener.on_removed(item).await {
                self.report(&err);
            }
        }
    }

    /// Replay a visibility transition for a batch of entities, every listener
    /// seeing the whole batch before the next listener runs.
    pub async fn visibility_changed(&self, items: &[E], visible: bool) {
        for listener in self.snapshot() {
            for item in items {
                if let Err(err) = listener.on_visibility_changed(item, visible).await {
                    self.report(&err);
                }
            }
        }
    }

    pub async fn before_removing_bulk(&self, items: &[E]) {
        for listener in self.snapshot() {
            for item in items {
                if let Err(err) = listener.before_removing(item).await {
                    self.report(&err);
                }
            }
        }
    }

    pub async fn on_removed_bulk(&self, items: &[E]) {
        for listener in self.snapshot() {
            for item in items {
                if let Err(err) = listener.on_removed(item).await {
                    self.report(&err);
                }
            }
        }
    }

    /// Bulk `before_saving` for freshly hydrated items (no originals).
    pub async fn before_saving_bulk(&self, items: &[E]) {
        for listener in self.snapshot() {
            for item in items {
                if let Err(err) = listener.before_saving(None, item).await {
                    self.report(&err);
                }
            }
        }
    }

    /// Bulk `on_saved` for freshly hydrated items (no originals).
    pub async fn on_saved_bulk(&self, items: &[E]) {
        for listener in self.snapshot() {
            for item in items {
                if let Err(err) = listener.on_saved(None, item).await {
                    self.report(&err);
                }
            }
        }
    }
}

impl<E: Entity> Default for Notifier<E> {
    fn default() -> Self {
        Self::new(tracing_error_sink())
    }
}

/// The storage seam under the dispatcher.
///
/// `do_save`/`do_remove` are invoked only for effective mutations, with the
/// replacement already carrying its final identifier.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    /// Produce a fresh identifier for a first save.
    fn generate_id(&self) -> Id<E>;

    async fn list(&self) -> RepoResult<Vec<E>>;

    async fn find(&self, id: &Id<E>) -> RepoResult<Option<E>>;

    /// Write `replacement`; `original` locates any prior slot/partition.
    async fn do_save(&self, original: Option<&E>, replacement: &E) -> RepoResult<()>;

    /// Delete `item`; returns whether it was actually present.
    async fn do_remove(&self, item: &E) -> RepoResult<bool>;
}

/// A repository that sequences listener hooks around an [`EntityStore`].
pub struct NotifyingRepository<E: Entity, S> {
    store: S,
    notifier: Notifier<E>,
}

impl<E: Entity, S: EntityStore<E>> NotifyingRepository<E, S> {
    pub fn new(store: S) -> Self {
        Self::with_error_sink(store, tracing_error_sink())
    }

    pub fn with_error_sink(store: S, sink: ErrorSink) -> Self {
        Self {
            store,
            notifier: Notifier::new(sink),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier<E> {
        &self.notifier
    }
}

#[async_trait]
impl<E: Entity, S: EntityStore<E>> Repository<E> for NotifyingRepository<E, S> {
    async fn list(&self) -> RepoResult<Vec<E>> {
        self.store.list().await
    }

    async fn find(&self, id: &Id<E>) -> RepoResult<Option<E>> {
        self.store.find(id).await
    }

    async fn save(&self, original: Option<&E>, replacement: E) -> RepoResult<Id<E>> {
        let id = replacement
            .id()
            .cloned()
            .or_else(|| original.and_then(|o| o.id().cloned()))
            .unwrap_or_else(|| self.store.generate_id());
        let replacement = replacement.with_id(id.clone());

        // No-op: the caller-supplied original is the entity believed stored;
        // an identical replacement means nothing would change.
        if let Some(original) = original {
            if original.id().is_some() && *original == replacement {
                return Ok(id);
            }
        }

        // `before_saving` is fired-and-final: a failed write below does not
        // un-fire it, and `on_saved` then never fires.
        self.notifier.before_saving(original, &replacement).await;
        self.store.do_save(original, &replacement).await?;
        self.notifier.on_saved(original, &replacement).await;
        Ok(id)
    }

    async fn remove(&self, id: &Id<E>) -> RepoResult<bool> {
        let Some(item) = self.store.find(id).await? else {
            return Ok(false);
        };

        self.notifier.before_removing(&item).await;
        let removed = self.store.do_remove(&item).await?;
        self.notifier.on_removed(&item).await;
        Ok(removed)
    }

    fn add_listener(&self, listener: Arc<dyn RepositoryListener<E>>) {
        self.notifier.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn RepositoryListener<E>>) {
        self.notifier.remove(listener);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use harbor_core::{RepoError, StorageError};

    use super::*;
    use crate::memory::MemoryStore;

    #[derive(Debug, Clone, PartialEq)]
    struct Doc {
        name: String,
        id: Option<Id<Doc>>,
    }

    impl Doc {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                id: None,
            }
        }
    }

    impl Entity for Doc {
        fn id(&self) -> Option<&Id<Self>> {
            self.id.as_ref()
        }

        fn with_id(mut self, id: Id<Self>) -> Self {
            self.id = Some(id);
            self
        }
    }

    /// Store whose reads always work but whose writes fail while `offline`
    /// is set, like a medium losing its backing device mid-session.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore<Doc>,
        offline: AtomicBool,
    }

    impl FlakyStore {
        fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }

        fn check_online(&self) -> RepoResult<()> {
            if self.offline.load(Ordering::SeqCst) {
                Err(StorageError::io("medium offline").into())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl EntityStore<Doc> for FlakyStore {
        fn generate_id(&self) -> Id<Doc> {
            self.inner.generate_id()
        }

        async fn list(&self) -> RepoResult<Vec<Doc>> {
            self.inner.list().await
        }

        async fn find(&self, id: &Id<Doc>) -> RepoResult<Option<Doc>> {
            self.inner.find(id).await
        }

        async fn do_save(&self, original: Option<&Doc>, replacement: &Doc) -> RepoResult<()> {
            self.check_online()?;
            self.inner.do_save(original, replacement).await
        }

        async fn do_remove(&self, item: &Doc) -> RepoResult<bool> {
            self.check_online()?;
            self.inner.do_remove(item).await
        }
    }

    #[derive(Default)]
    struct CountingListener {
        before_saving: AtomicUsize,
        on_saved: AtomicUsize,
        before_removing: AtomicUsize,
        on_removed: AtomicUsize,
    }

    #[async_trait]
    impl RepositoryListener<Doc> for CountingListener {
        async fn before_saving(
            &self,
            _original: Option<&Doc>,
            _replacement: &Doc,
        ) -> anyhow::Result<()> {
            self.before_saving.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_saved(
            &self,
            _original: Option<&Doc>,
            _replacement: &Doc,
        ) -> anyhow::Result<()> {
            self.on_saved.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn before_removing(&self, _item: &Doc) -> anyhow::Result<()> {
            self.before_removing.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_removed(&self, _item: &Doc) -> anyhow::Result<()> {
            self.on_removed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_write_surfaces_storage_error_and_suppresses_on_saved() {
        let repo = NotifyingRepository::new(FlakyStore::default());
        let listener = Arc::new(CountingListener::default());
        repo.add_listener(listener.clone());

        repo.store().go_offline();
        let err = repo.save(None, Doc::new("A")).await.unwrap_err();
        assert!(matches!(err, RepoError::Storage(_)));

        // `before_saving` is fired-and-final; the after hook never runs.
        assert_eq!(listener.before_saving.load(Ordering::SeqCst), 1);
        assert_eq!(listener.on_saved.load(Ordering::SeqCst), 0);
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_surfaces_storage_error_and_suppresses_on_removed() {
        let repo = NotifyingRepository::new(FlakyStore::default());
        let listener = Arc::new(CountingListener::default());
        repo.add_listener(listener.clone());

        let id = repo.save(None, Doc::new("A")).await.unwrap();
        assert_eq!(listener.on_saved.load(Ordering::SeqCst), 1);

        repo.store().go_offline();
        let err = repo.remove(&id).await.unwrap_err();
        assert!(matches!(err, RepoError::Storage(_)));

        assert_eq!(listener.before_removing.load(Ordering::SeqCst), 1);
        assert_eq!(listener.on_removed.load(Ordering::SeqCst), 0);

        // The entity is still there; the caller may retry.
        assert!(repo.find(&id).await.unwrap().is_some());
    }
}
