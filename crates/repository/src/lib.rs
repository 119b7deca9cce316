//! `harbor-repository` — the observable repository contract, its
//! notification dispatcher, and the in-memory reference implementation.

pub mod contract;
pub mod listener;
pub mod memory;
pub mod notify;

pub use contract::Repository;
pub use listener::{ErrorSink, RepositoryListener, tracing_error_sink};
pub use memory::{InMemoryRepository, MemoryStore};
pub use notify::{EntityStore, Notifier, NotifyingRepository};
