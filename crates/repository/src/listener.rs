//! Listener contract and the error sink for failing callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use harbor_core::Entity;

/// Observer of repository state transitions.
///
/// Callbacks are invoked sequentially in listener-registration order, never
/// concurrently for the same event. A returned error is caught at the
/// dispatch boundary and forwarded to the repository's [`ErrorSink`]; it does
/// not prevent other listeners from running, nor does it fail the enclosing
/// operation.
///
/// All methods default to no-ops so implementors only override what they
/// care about.
#[async_trait]
pub trait RepositoryListener<E: Entity>: Send + Sync {
    /// Fired before an effective save's storage write.
    async fn before_saving(&self, _original: Option<&E>, _replacement: &E) -> anyhow::Result<()> {
        Ok(())
    }

    /// Fired after an effective save's storage write succeeded.
    async fn on_saved(&self, _original: Option<&E>, _replacement: &E) -> anyhow::Result<()> {
        Ok(())
    }

    /// Fired before an existing entity's storage delete.
    async fn before_removing(&self, _item: &E) -> anyhow::Result<()> {
        Ok(())
    }

    /// Fired after an existing entity's storage delete.
    async fn on_removed(&self, _item: &E) -> anyhow::Result<()> {
        Ok(())
    }

    /// Fired when an entity enters (`visible`) or leaves (`!visible`) the
    /// observed set without being created or destroyed, e.g. because its
    /// partition was activated or deactivated.
    async fn on_visibility_changed(&self, _item: &E, _visible: bool) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Best-effort diagnostic sink for listener callback failures.
///
/// Never expected to alter control flow.
pub type ErrorSink = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

/// The default sink: report through `tracing`.
pub fn tracing_error_sink() -> ErrorSink {
    Arc::new(|err| tracing::error!("listener callback failed: {err:?}"))
}
