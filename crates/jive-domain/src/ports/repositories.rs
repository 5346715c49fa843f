//! Repository ports over the hybrid document + vector store

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{ArchitectureItem, ExecutionRecord, TroubleshootItem, WorkItem};
use crate::error::Result;
use crate::value_objects::{ListQuery, Scored, SearchRequest};

/// Work item persistence and search.
///
/// Writes are serialized per table by the engine; `update` re-embeds the
/// record when its title or description changed.
#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    /// Insert a new work item.
    ///
    /// # Errors
    ///
    /// `Conflict` on duplicate id; storage errors otherwise.
    async fn create(&self, item: WorkItem) -> Result<WorkItem>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<WorkItem>>;

    /// Replace the stored record, recomputing `updated_at` and the vector.
    ///
    /// # Errors
    ///
    /// `NotFound` when the id does not exist.
    async fn update(&self, item: WorkItem) -> Result<WorkItem>;

    /// Delete by id; returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Bounded, filtered, sorted listing.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for unknown filter or sort fields.
    async fn list(&self, query: ListQuery) -> Result<Vec<WorkItem>>;

    /// Every stored work item (graph construction, recalculation walks).
    async fn list_all(&self) -> Result<Vec<WorkItem>>;

    /// Direct children of `parent_id`.
    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<WorkItem>>;

    /// Items with no parent.
    async fn roots(&self) -> Result<Vec<WorkItem>>;

    /// Vector / keyword / hybrid search.
    async fn search(&self, request: SearchRequest) -> Result<Vec<Scored<WorkItem>>>;
}

/// Architecture memory persistence.
#[async_trait]
pub trait ArchitectureRepository: Send + Sync {
    /// Insert a new item.
    ///
    /// # Errors
    ///
    /// `Conflict` on duplicate id or slug.
    async fn create(&self, item: ArchitectureItem) -> Result<ArchitectureItem>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<ArchitectureItem>>;

    /// Fetch by slug (slugs are stored lower-cased).
    async fn get_by_slug(&self, slug: &str) -> Result<Option<ArchitectureItem>>;

    /// Replace the stored record, re-embedding when the body changed.
    async fn update(&self, item: ArchitectureItem) -> Result<ArchitectureItem>;

    /// Delete by id; returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Bounded, filtered listing.
    async fn list(&self, query: ListQuery) -> Result<Vec<ArchitectureItem>>;

    /// Semantic (vector-only) search.
    async fn search(&self, request: SearchRequest) -> Result<Vec<Scored<ArchitectureItem>>>;
}

/// Troubleshoot memory persistence.
#[async_trait]
pub trait TroubleshootRepository: Send + Sync {
    /// Insert a new item.
    ///
    /// # Errors
    ///
    /// `Conflict` on duplicate id or slug.
    async fn create(&self, item: TroubleshootItem) -> Result<TroubleshootItem>;

    /// Fetch by id.
    async fn get(&self, id: Uuid) -> Result<Option<TroubleshootItem>>;

    /// Fetch by slug (slugs are stored lower-cased).
    async fn get_by_slug(&self, slug: &str) -> Result<Option<TroubleshootItem>>;

    /// Replace the stored record, re-embedding when content changed.
    async fn update(&self, item: TroubleshootItem) -> Result<TroubleshootItem>;

    /// Delete by id; returns whether a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Bounded, filtered listing.
    async fn list(&self, query: ListQuery) -> Result<Vec<TroubleshootItem>>;

    /// Semantic (vector-only) search.
    async fn search(&self, request: SearchRequest) -> Result<Vec<Scored<TroubleshootItem>>>;

    /// Raise `usage_count` (and `success_count` when `success`) by one.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown slug.
    async fn increment_usage(&self, slug: &str, success: bool) -> Result<TroubleshootItem>;
}

/// Execution record persistence (rehydrated into memory at startup).
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Persist a new record.
    async fn create(&self, record: ExecutionRecord) -> Result<ExecutionRecord>;

    /// Fetch by execution id.
    async fn get(&self, execution_id: Uuid) -> Result<Option<ExecutionRecord>>;

    /// Replace the stored record.
    async fn update(&self, record: ExecutionRecord) -> Result<ExecutionRecord>;

    /// All stored records.
    async fn list_all(&self) -> Result<Vec<ExecutionRecord>>;
}
