//! Repository error model.

use thiserror::Error;

/// Result type used across the repository layer.
pub type RepoResult<T> = Result<T, RepoError>;

/// Failure of the persistent key-value medium.
///
/// Surfaced to the caller of `save`/`remove`/`list`/`find`, never retried
/// automatically by the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The medium failed to read or write.
    #[error("medium I/O failed: {0}")]
    Io(String),

    /// A stored value could not be decoded into an entity.
    #[error("stored value could not be decoded: {0}")]
    Codec(String),
}

impl StorageError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }
}

/// Error returned by repository operations.
///
/// Listener callback failures are deliberately absent here: they are caught
/// at the dispatch boundary, reported to the error sink, and never abort the
/// enclosing operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// The backing medium failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Programmer error, e.g. removing an entity that has no identifier.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl RepoError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
