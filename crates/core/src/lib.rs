//! `harbor-core` — repository domain foundation.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{RepoError, RepoResult, StorageError};
pub use id::Id;
