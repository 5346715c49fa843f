//! Application context construction
//!
//! Builds the storage engine, repositories, and every use-case service at
//! startup and hands them around as one shared context. No singletons: the
//! context is constructed once in `main` (or per test) and passed in
//! explicitly.

use std::sync::Arc;

use jive_application::{
    ArchitectureContextService, ContentSearchService, DependencyService, ExecutionService,
    HierarchyService, IdentifierResolver, MemoryService, ProblemMatcher, ProgressService,
    SyncService,
};
use jive_domain::error::Result;
use jive_domain::ports::{
    ArchitectureRepository, EmbeddingProvider, ExecutionRepository, TroubleshootRepository,
    WorkItemRepository,
};
use jive_providers::retry::RetryPolicy;
use jive_providers::{
    ArchitectureRepositoryImpl, DocumentStore, ExecutionRepositoryImpl, HashEmbeddingProvider,
    TroubleshootRepositoryImpl, WorkItemRepositoryImpl,
};

use crate::config::AppConfig;

/// Everything a tool handler needs, wired once at startup.
pub struct AppContext {
    /// Loaded configuration
    pub config: AppConfig,
    /// Work item repository
    pub work_items: Arc<dyn WorkItemRepository>,
    /// Architecture memory repository
    pub architecture: Arc<dyn ArchitectureRepository>,
    /// Troubleshoot memory repository
    pub troubleshoot: Arc<dyn TroubleshootRepository>,
    /// Execution record repository
    pub executions: Arc<dyn ExecutionRepository>,
    /// Identifier resolution
    pub resolver: Arc<IdentifierResolver>,
    /// Hierarchy traversal
    pub hierarchy: Arc<HierarchyService>,
    /// Progress calculation
    pub progress: Arc<ProgressService>,
    /// Dependency engine
    pub dependency: Arc<DependencyService>,
    /// Execution tracker
    pub execution: Arc<ExecutionService>,
    /// Memory facade
    pub memory: Arc<MemoryService>,
    /// Token-budgeted retrieval
    pub context: Arc<ArchitectureContextService>,
    /// Problem → solution matching
    pub matcher: Arc<ProblemMatcher>,
    /// Unified content search
    pub search: Arc<ContentSearchService>,
    /// Markdown sync
    pub sync: Arc<SyncService>,
}

impl AppContext {
    /// Build the full context from configuration.
    ///
    /// Opens (and rehydrates) the document store, wires every repository
    /// and service, and reloads persisted execution records.
    ///
    /// # Errors
    ///
    /// Storage errors opening or rehydrating the store.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::new());
        Self::build_with(config, embedder, RetryPolicy::default()).await
    }

    /// Build with an explicit embedding provider and retry policy.
    ///
    /// # Errors
    ///
    /// Storage errors opening or rehydrating the store.
    pub async fn build_with(
        config: AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let store = Arc::new(DocumentStore::open(config.data_dir.as_deref(), embedder).await?);

        let work_items: Arc<dyn WorkItemRepository> =
            Arc::new(WorkItemRepositoryImpl::new(Arc::clone(&store), policy));
        let architecture: Arc<dyn ArchitectureRepository> =
            Arc::new(ArchitectureRepositoryImpl::new(Arc::clone(&store), policy));
        let troubleshoot: Arc<dyn TroubleshootRepository> =
            Arc::new(TroubleshootRepositoryImpl::new(Arc::clone(&store), policy));
        let executions: Arc<dyn ExecutionRepository> =
            Arc::new(ExecutionRepositoryImpl::new(store));

        let resolver = Arc::new(IdentifierResolver::new(Arc::clone(&work_items)));
        let hierarchy = Arc::new(HierarchyService::new(Arc::clone(&work_items)));
        let progress = Arc::new(ProgressService::new(Arc::clone(&work_items)));
        let dependency = Arc::new(DependencyService::new(Arc::clone(&work_items)));
        let execution = Arc::new(ExecutionService::new(
            Arc::clone(&work_items),
            Arc::clone(&executions),
            Arc::clone(&dependency),
        ));
        let memory = Arc::new(MemoryService::new(
            Arc::clone(&architecture),
            Arc::clone(&troubleshoot),
        ));
        let context = Arc::new(ArchitectureContextService::new(Arc::clone(&architecture)));
        let matcher = Arc::new(ProblemMatcher::new(Arc::clone(&troubleshoot)));
        let search = Arc::new(ContentSearchService::new(
            Arc::clone(&work_items),
            Arc::clone(&architecture),
            Arc::clone(&troubleshoot),
        ));
        let sync = Arc::new(SyncService::new(Arc::clone(&memory)));

        let rehydrated = execution.rehydrate().await?;
        if rehydrated > 0 {
            tracing::info!(count = rehydrated, "rehydrated execution records");
        }

        Ok(Self {
            config,
            work_items,
            architecture,
            troubleshoot,
            executions,
            resolver,
            hierarchy,
            progress,
            dependency,
            execution,
            memory,
            context,
            matcher,
            search,
            sync,
        })
    }

    /// In-memory context for tests: no data dir, no retry delays.
    ///
    /// # Errors
    ///
    /// Storage errors (none expected for an in-memory store).
    pub async fn build_in_memory() -> Result<Self> {
        let config = AppConfig {
            data_dir: None,
            ..AppConfig::default()
        };
        Self::build_with(
            config,
            Arc::new(HashEmbeddingProvider::new()),
            RetryPolicy::immediate(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jive_domain::entities::{WorkItem, WorkItemType};

    #[tokio::test]
    async fn in_memory_context_wires_every_service() {
        let ctx = AppContext::build_in_memory().await.unwrap();
        let item = ctx
            .work_items
            .create(WorkItem::new(
                WorkItemType::Initiative,
                "Bootstrap check".to_owned(),
                Utc::now(),
            ))
            .await
            .unwrap();
        assert_eq!(
            ctx.resolver.resolve("Bootstrap check").await.unwrap().id,
            Some(item.id)
        );
        assert!(ctx.hierarchy.get_roots().await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn persistent_context_rehydrates_across_builds() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..AppConfig::default()
        };

        let first = AppContext::build_with(
            config.clone(),
            Arc::new(HashEmbeddingProvider::new()),
            RetryPolicy::immediate(),
        )
        .await
        .unwrap();
        let item = first
            .work_items
            .create(WorkItem::new(
                WorkItemType::Task,
                "Persisted item".to_owned(),
                Utc::now(),
            ))
            .await
            .unwrap();
        drop(first);

        let second = AppContext::build_with(
            config,
            Arc::new(HashEmbeddingProvider::new()),
            RetryPolicy::immediate(),
        )
        .await
        .unwrap();
        assert!(second.work_items.get(item.id).await.unwrap().is_some());
    }
}
