//! Namespaced memory CRUD and semantic search
//!
//! One service fronting both memory namespaces. Validation (field caps,
//! slug normalization) happens here so every entry path shares it; search
//! is vector-only, with text search left to the generic content search.

use std::sync::Arc;

use uuid::Uuid;

use jive_domain::entities::{ArchitectureItem, TroubleshootItem};
use jive_domain::error::{Error, Result};
use jive_domain::ports::{ArchitectureRepository, TroubleshootRepository};
use jive_domain::utils::time;
use jive_domain::value_objects::{ListQuery, Scored, SearchMode, SearchRequest};

/// Memory subsystem facade.
pub struct MemoryService {
    architecture: Arc<dyn ArchitectureRepository>,
    troubleshoot: Arc<dyn TroubleshootRepository>,
}

impl MemoryService {
    /// Create the service over both namespace repositories.
    #[must_use]
    pub fn new(
        architecture: Arc<dyn ArchitectureRepository>,
        troubleshoot: Arc<dyn TroubleshootRepository>,
    ) -> Self {
        Self {
            architecture,
            troubleshoot,
        }
    }

    /// The architecture repository.
    #[must_use]
    pub fn architecture(&self) -> &Arc<dyn ArchitectureRepository> {
        &self.architecture
    }

    /// The troubleshoot repository.
    #[must_use]
    pub fn troubleshoot(&self) -> &Arc<dyn TroubleshootRepository> {
        &self.troubleshoot
    }

    /// Create an architecture item after validation.
    ///
    /// # Errors
    ///
    /// Validation errors for bad fields; `Conflict` on duplicate slug.
    pub async fn create_architecture(&self, mut item: ArchitectureItem) -> Result<ArchitectureItem> {
        item.validate()?;
        self.architecture.create(item).await
    }

    /// Update an architecture item by slug, merging provided fields.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown slugs; validation errors for bad fields.
    pub async fn update_architecture(&self, mut item: ArchitectureItem) -> Result<ArchitectureItem> {
        item.validate()?;
        self.architecture.update(item).await
    }

    /// Fetch an architecture item by slug or id string.
    ///
    /// # Errors
    ///
    /// Storage errors; a miss is `Ok(None)`.
    pub async fn get_architecture(&self, identifier: &str) -> Result<Option<ArchitectureItem>> {
        if let Ok(id) = identifier.parse::<Uuid>() {
            if let Some(item) = self.architecture.get(id).await? {
                return Ok(Some(item));
            }
        }
        self.architecture.get_by_slug(identifier).await
    }

    /// Delete an architecture item by slug or id string.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing matches.
    pub async fn delete_architecture(&self, identifier: &str) -> Result<()> {
        let item = self
            .get_architecture(identifier)
            .await?
            .ok_or_else(|| Error::not_found(identifier.to_owned()))?;
        self.architecture.delete(item.id).await?;
        Ok(())
    }

    /// List architecture items.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for unknown fields; storage errors.
    pub async fn list_architecture(&self, query: ListQuery) -> Result<Vec<ArchitectureItem>> {
        self.architecture.list(query).await
    }

    /// Semantic search over architecture items.
    ///
    /// # Errors
    ///
    /// Storage and embedding errors.
    pub async fn search_architecture(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Scored<ArchitectureItem>>> {
        self.architecture
            .search(SearchRequest::new(query, SearchMode::Vector, limit))
            .await
    }

    /// Create a troubleshoot item after validation.
    ///
    /// # Errors
    ///
    /// Validation errors for bad fields; `Conflict` on duplicate slug.
    pub async fn create_troubleshoot(&self, mut item: TroubleshootItem) -> Result<TroubleshootItem> {
        item.validate()?;
        self.troubleshoot.create(item).await
    }

    /// Update a troubleshoot item.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown slugs; validation errors for bad fields.
    pub async fn update_troubleshoot(&self, mut item: TroubleshootItem) -> Result<TroubleshootItem> {
        item.validate()?;
        self.troubleshoot.update(item).await
    }

    /// Fetch a troubleshoot item by slug or id string.
    ///
    /// # Errors
    ///
    /// Storage errors; a miss is `Ok(None)`.
    pub async fn get_troubleshoot(&self, identifier: &str) -> Result<Option<TroubleshootItem>> {
        if let Ok(id) = identifier.parse::<Uuid>() {
            if let Some(item) = self.troubleshoot.get(id).await? {
                return Ok(Some(item));
            }
        }
        self.troubleshoot.get_by_slug(identifier).await
    }

    /// Delete a troubleshoot item by slug or id string.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing matches.
    pub async fn delete_troubleshoot(&self, identifier: &str) -> Result<()> {
        let item = self
            .get_troubleshoot(identifier)
            .await?
            .ok_or_else(|| Error::not_found(identifier.to_owned()))?;
        self.troubleshoot.delete(item.id).await?;
        Ok(())
    }

    /// List troubleshoot items.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for unknown fields; storage errors.
    pub async fn list_troubleshoot(&self, query: ListQuery) -> Result<Vec<TroubleshootItem>> {
        self.troubleshoot.list(query).await
    }

    /// Semantic search over troubleshoot items.
    ///
    /// # Errors
    ///
    /// Storage and embedding errors.
    pub async fn search_troubleshoot(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Scored<TroubleshootItem>>> {
        self.troubleshoot
            .search(SearchRequest::new(query, SearchMode::Vector, limit))
            .await
    }

    /// Build a new architecture item from parts with fresh timestamps.
    #[must_use]
    pub fn new_architecture_item(slug: &str, title: &str, requirements: &str) -> ArchitectureItem {
        let now = time::now();
        ArchitectureItem {
            id: Uuid::new_v4(),
            unique_slug: slug.to_owned(),
            title: title.to_owned(),
            ai_requirements: requirements.to_owned(),
            ai_when_to_use: Vec::new(),
            keywords: Vec::new(),
            children_slugs: Vec::new(),
            related_slugs: Vec::new(),
            linked_epic_ids: Vec::new(),
            tags: Vec::new(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            created_on: now,
            last_updated_on: now,
        }
    }

    /// Build a new troubleshoot item from parts with fresh timestamps.
    #[must_use]
    pub fn new_troubleshoot_item(slug: &str, title: &str, solutions: &str) -> TroubleshootItem {
        let now = time::now();
        TroubleshootItem {
            id: Uuid::new_v4(),
            unique_slug: slug.to_owned(),
            title: title.to_owned(),
            ai_use_case: Vec::new(),
            ai_solutions: solutions.to_owned(),
            keywords: Vec::new(),
            tags: Vec::new(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            usage_count: 0,
            success_count: 0,
            created_on: now,
            last_updated_on: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jive_providers::retry::RetryPolicy;
    use jive_providers::{
        ArchitectureRepositoryImpl, DocumentStore, HashEmbeddingProvider,
        TroubleshootRepositoryImpl,
    };

    async fn service() -> MemoryService {
        let store = Arc::new(
            DocumentStore::open(None, Arc::new(HashEmbeddingProvider::new()))
                .await
                .unwrap(),
        );
        MemoryService::new(
            Arc::new(ArchitectureRepositoryImpl::new(
                Arc::clone(&store),
                RetryPolicy::immediate(),
            )),
            Arc::new(TroubleshootRepositoryImpl::new(
                store,
                RetryPolicy::immediate(),
            )),
        )
    }

    #[tokio::test]
    async fn architecture_crud_by_slug() {
        let svc = service().await;
        let mut item =
            MemoryService::new_architecture_item("Event-Driven", "Event Driven", "Use queues.");
        item.keywords = vec!["queues".to_owned()];
        svc.create_architecture(item).await.unwrap();

        // Slug was normalized; lookups are case-insensitive
        let fetched = svc.get_architecture("event-driven").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Event Driven");

        svc.delete_architecture("event-driven").await.unwrap();
        assert!(svc.get_architecture("event-driven").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_slug_conflicts_within_namespace() {
        let svc = service().await;
        svc.create_architecture(MemoryService::new_architecture_item("same", "A", "x"))
            .await
            .unwrap();
        let err = svc
            .create_architecture(MemoryService::new_architecture_item("same", "B", "y"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");

        // Same slug in the other namespace is fine
        svc.create_troubleshoot(MemoryService::new_troubleshoot_item("same", "T", "z"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn semantic_search_ranks_relevant_items_first() {
        let svc = service().await;
        let mut relevant =
            MemoryService::new_troubleshoot_item("db-pool", "Pool exhaustion", "Raise pool size.");
        relevant.ai_use_case = vec!["database connection pool exhausted".to_owned()];
        let mut other =
            MemoryService::new_troubleshoot_item("css", "CSS glitch", "Clear the cache.");
        other.ai_use_case = vec!["layout broken on mobile".to_owned()];
        svc.create_troubleshoot(relevant).await.unwrap();
        svc.create_troubleshoot(other).await.unwrap();

        let hits = svc
            .search_troubleshoot("database connection pool exhausted", 5)
            .await
            .unwrap();
        assert_eq!(hits[0].item.unique_slug, "db-pool");
    }
}
