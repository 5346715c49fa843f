//! Unified content search across work items and memory
//!
//! One entry point for the search tool: dispatches to the per-table search
//! engines and folds the results into a single ranked list tagged by
//! source.

use std::sync::Arc;

use serde::Serialize;

use jive_domain::error::Result;
use jive_domain::ports::{
    ArchitectureRepository, TroubleshootRepository, WorkItemRepository,
};
use jive_domain::value_objects::{Filters, SearchMode, SearchRequest};

/// What to search.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Deserialize,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SearchScope {
    /// Work items only (default)
    WorkItems,
    /// Architecture memory only
    Architecture,
    /// Troubleshoot memory only
    Troubleshoot,
    /// Everything
    All,
}

/// One hit in a unified result list.
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedSearchHit {
    /// Which table produced the hit
    pub source: SearchScope,
    /// Relevance in [0, 1]
    pub score: f64,
    /// The record, already shaped for the tool surface
    pub record: serde_json::Value,
}

/// Unified search service.
pub struct ContentSearchService {
    work_items: Arc<dyn WorkItemRepository>,
    architecture: Arc<dyn ArchitectureRepository>,
    troubleshoot: Arc<dyn TroubleshootRepository>,
}

impl ContentSearchService {
    /// Create the service over all searchable repositories.
    #[must_use]
    pub fn new(
        work_items: Arc<dyn WorkItemRepository>,
        architecture: Arc<dyn ArchitectureRepository>,
        troubleshoot: Arc<dyn TroubleshootRepository>,
    ) -> Self {
        Self {
            work_items,
            architecture,
            troubleshoot,
        }
    }

    /// Search `scope` for `query` under `mode`, merged and ranked.
    ///
    /// Memory namespaces only support vector search; when a keyword or
    /// hybrid search spans them, they are queried in vector mode and fused
    /// by score.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for unknown filter fields (work items only);
    /// storage and embedding errors.
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        scope: SearchScope,
        filters: Filters,
        limit: usize,
    ) -> Result<Vec<UnifiedSearchHit>> {
        let mut hits: Vec<UnifiedSearchHit> = Vec::new();

        if matches!(scope, SearchScope::WorkItems | SearchScope::All) {
            let request = SearchRequest {
                query: query.to_owned(),
                mode,
                filters: filters.clone(),
                limit,
            };
            for scored in self.work_items.search(request).await? {
                hits.push(UnifiedSearchHit {
                    source: SearchScope::WorkItems,
                    score: scored.score,
                    record: serde_json::to_value(&scored.item)?,
                });
            }
        }
        if matches!(scope, SearchScope::Architecture | SearchScope::All) {
            let request = SearchRequest::new(query, SearchMode::Vector, limit);
            for scored in self.architecture.search(request).await? {
                hits.push(UnifiedSearchHit {
                    source: SearchScope::Architecture,
                    score: scored.score,
                    record: serde_json::to_value(&scored.item)?,
                });
            }
        }
        if matches!(scope, SearchScope::Troubleshoot | SearchScope::All) {
            let request = SearchRequest::new(query, SearchMode::Vector, limit);
            for scored in self.troubleshoot.search(request).await? {
                hits.push(UnifiedSearchHit {
                    source: SearchScope::Troubleshoot,
                    score: scored.score,
                    record: serde_json::to_value(&scored.item)?,
                });
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jive_domain::entities::{WorkItem, WorkItemType};
    use jive_providers::retry::RetryPolicy;
    use jive_providers::{
        ArchitectureRepositoryImpl, DocumentStore, HashEmbeddingProvider,
        TroubleshootRepositoryImpl, WorkItemRepositoryImpl,
    };

    use crate::use_cases::memory::MemoryService;

    async fn service() -> (ContentSearchService, Arc<dyn WorkItemRepository>) {
        let store = Arc::new(
            DocumentStore::open(None, Arc::new(HashEmbeddingProvider::new()))
                .await
                .unwrap(),
        );
        let work_items: Arc<dyn WorkItemRepository> = Arc::new(WorkItemRepositoryImpl::new(
            Arc::clone(&store),
            RetryPolicy::immediate(),
        ));
        let architecture: Arc<dyn ArchitectureRepository> = Arc::new(
            ArchitectureRepositoryImpl::new(Arc::clone(&store), RetryPolicy::immediate()),
        );
        let troubleshoot: Arc<dyn TroubleshootRepository> = Arc::new(
            TroubleshootRepositoryImpl::new(store, RetryPolicy::immediate()),
        );

        let memory = MemoryService::new(Arc::clone(&architecture), Arc::clone(&troubleshoot));
        let mut arch =
            MemoryService::new_architecture_item("search-arch", "Search architecture", "Indexing.");
        arch.keywords = vec!["search".to_owned()];
        memory.create_architecture(arch).await.unwrap();

        (
            ContentSearchService::new(Arc::clone(&work_items), architecture, troubleshoot),
            work_items,
        )
    }

    #[tokio::test]
    async fn scoped_search_returns_only_that_source() {
        let (svc, work_items) = service().await;
        let mut item = WorkItem::new(
            WorkItemType::Task,
            "Search indexing work".to_owned(),
            Utc::now(),
        );
        item.description = "Build the search index".to_owned();
        work_items.create(item).await.unwrap();

        let hits = svc
            .search(
                "search indexing",
                SearchMode::Keyword,
                SearchScope::WorkItems,
                Filters::new(),
                10,
            )
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.source == SearchScope::WorkItems));
    }

    #[tokio::test]
    async fn all_scope_merges_sources() {
        let (svc, work_items) = service().await;
        let mut item = WorkItem::new(
            WorkItemType::Task,
            "Search indexing work".to_owned(),
            Utc::now(),
        );
        item.description = "Build the search index".to_owned();
        work_items.create(item).await.unwrap();

        let hits = svc
            .search(
                "search indexing architecture",
                SearchMode::Hybrid,
                SearchScope::All,
                Filters::new(),
                10,
            )
            .await
            .unwrap();
        let sources: std::collections::HashSet<_> =
            hits.iter().map(|h| h.source).collect();
        assert!(sources.contains(&SearchScope::WorkItems));
        assert!(sources.contains(&SearchScope::Architecture));
    }
}
