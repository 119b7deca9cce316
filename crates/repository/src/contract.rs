//! The repository contract every concrete variant supports.

use std::sync::Arc;

use async_trait::async_trait;
use harbor_core::{Entity, Id, RepoError, RepoResult};

use crate::listener::RepositoryListener;

/// Observable store of identified entities.
///
/// All operations are invoked from one logical thread of control per
/// instance; they may suspend (e.g. while awaiting a persistent medium) but
/// must not run concurrently against the same instance without external
/// serialization.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Snapshot of the currently visible entities, in storage order.
    ///
    /// The returned vector is stable: later mutations do not retroactively
    /// alter it.
    async fn list(&self) -> RepoResult<Vec<E>>;

    /// Look up one entity; `None` (not an error) when absent.
    async fn find(&self, id: &Id<E>) -> RepoResult<Option<E>>;

    /// Insert-or-replace `replacement`, returning its (possibly freshly
    /// generated) identifier.
    ///
    /// `original`, if given, must be the entity currently believed to occupy
    /// that slot; it is used for no-op detection and for locating the prior
    /// partition. A save whose ID-assigned replacement equals `original`
    /// fires no listener hooks and performs no storage write.
    async fn save(&self, original: Option<&E>, replacement: E) -> RepoResult<Id<E>>;

    /// Remove by identifier. Removing an absent identifier is a silent
    /// success returning `false`, with no hooks fired.
    async fn remove(&self, id: &Id<E>) -> RepoResult<bool>;

    /// Remove by entity; fails with `InvalidState` if it has no identifier.
    async fn remove_entity(&self, item: &E) -> RepoResult<bool> {
        let id = item.id().cloned().ok_or_else(|| {
            RepoError::invalid_state("cannot remove an entity that was never saved")
        })?;
        self.remove(&id).await
    }

    /// Register a listener. Registration order determines notification order.
    fn add_listener(&self, listener: Arc<dyn RepositoryListener<E>>);

    /// Unregister a listener; it receives no notifications dispatched after
    /// this call returns.
    fn remove_listener(&self, listener: &Arc<dyn RepositoryListener<E>>);
}
