//! Provider layer for MCP Jive.
//!
//! Implements the domain ports:
//!
//! - [`embedding`] — the default deterministic embedding provider
//! - [`store`] — the hybrid document + vector storage engine
//! - [`repositories`] — repository-trait implementations over the store
//! - [`retry`] — the storage retry/backoff policy

pub mod embedding;
pub mod repositories;
pub mod retry;
pub mod store;

pub use embedding::HashEmbeddingProvider;
pub use repositories::{
    ArchitectureRepositoryImpl, ExecutionRepositoryImpl, TroubleshootRepositoryImpl,
    WorkItemRepositoryImpl,
};
pub use store::DocumentStore;
