//! Repository implementations over the document store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use jive_domain::entities::{ArchitectureItem, ExecutionRecord, TroubleshootItem, WorkItem};
use jive_domain::error::{Error, Result};
use jive_domain::utils::time;
use jive_domain::value_objects::{
    Embedding, ListQuery, Scored, SearchMode, SearchRequest, distance_to_score,
};

use crate::retry::{RetryPolicy, with_retry};
use crate::store::{DocumentStore, Table, TableRecord};

/// Hybrid fusion weight for the vector component.
const VECTOR_WEIGHT: f64 = 0.6;
/// Hybrid fusion weight for the keyword component.
const KEYWORD_WEIGHT: f64 = 0.4;
/// Soft per-call limit on embedding generation.
const EMBED_TIMEOUT: Duration = Duration::from_secs(5);

async fn embed_text(store: &DocumentStore, policy: RetryPolicy, text: &str) -> Result<Embedding> {
    with_retry(policy, || async {
        let embedder = store.embedder();
        match tokio::time::timeout(EMBED_TIMEOUT, embedder.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                seconds: EMBED_TIMEOUT.as_secs(),
            }),
        }
    })
    .await
}

/// Vector for a record, or `None` when it has no embeddable text.
async fn vector_for<T: TableRecord>(
    store: &DocumentStore,
    policy: RetryPolicy,
    record: &T,
) -> Result<Option<Embedding>> {
    let text = record.embed_text();
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(embed_text(store, policy, &text).await?))
}

/// Shared search dispatch over a table.
async fn search_table<T: TableRecord>(
    store: &DocumentStore,
    policy: RetryPolicy,
    table: &Table<T>,
    request: &SearchRequest,
) -> Result<Vec<Scored<T>>> {
    match request.mode {
        SearchMode::Vector => {
            let query = embed_text(store, policy, &request.query).await?;
            let hits = table
                .vector_search(&query, request.limit, &request.filters)
                .await?;
            Ok(hits
                .into_iter()
                .map(|(item, distance)| Scored {
                    item,
                    score: distance_to_score(distance),
                    distance: Some(distance),
                })
                .collect())
        }
        SearchMode::Keyword => {
            let hits = table
                .keyword_search(&request.query, request.limit, &request.filters)
                .await?;
            Ok(hits
                .into_iter()
                .map(|(item, score)| Scored {
                    item,
                    score,
                    distance: None,
                })
                .collect())
        }
        SearchMode::Hybrid => {
            let query = embed_text(store, policy, &request.query).await?;
            let hits = table
                .hybrid_search(
                    &query,
                    &request.query,
                    request.limit,
                    &request.filters,
                    VECTOR_WEIGHT,
                    KEYWORD_WEIGHT,
                )
                .await?;
            Ok(hits
                .into_iter()
                .map(|(item, score, distance)| Scored {
                    item,
                    score,
                    distance,
                })
                .collect())
        }
    }
}

/// Work item repository over the document store.
pub struct WorkItemRepositoryImpl {
    store: Arc<DocumentStore>,
    policy: RetryPolicy,
}

impl WorkItemRepositoryImpl {
    /// Wrap the shared store.
    #[must_use]
    pub fn new(store: Arc<DocumentStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }
}

#[async_trait]
impl jive_domain::ports::WorkItemRepository for WorkItemRepositoryImpl {
    async fn create(&self, item: WorkItem) -> Result<WorkItem> {
        let vector = vector_for(&self.store, self.policy, &item).await?;
        self.store.work_items().insert(item, vector).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<WorkItem>> {
        Ok(self.store.work_items().get(id).await)
    }

    async fn update(&self, mut item: WorkItem) -> Result<WorkItem> {
        let previous = self
            .store
            .work_items()
            .get(item.id)
            .await
            .ok_or_else(|| Error::not_found(item.id.to_string()))?;
        item.touch(time::now());
        // Re-embed only when the text feeding the vector changed
        let vector = if previous.embed_text() == item.embed_text() {
            None
        } else {
            vector_for(&self.store, self.policy, &item).await?
        };
        self.store.work_items().replace(item, vector).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.store.work_items().remove(id).await
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<WorkItem>> {
        self.store.work_items().list(&query).await
    }

    async fn list_all(&self) -> Result<Vec<WorkItem>> {
        Ok(self.store.work_items().all().await)
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<WorkItem>> {
        let mut children: Vec<WorkItem> = self
            .store
            .work_items()
            .all()
            .await
            .into_iter()
            .filter(|w| w.parent_id == Some(parent_id))
            .collect();
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(children)
    }

    async fn roots(&self) -> Result<Vec<WorkItem>> {
        let mut roots: Vec<WorkItem> = self
            .store
            .work_items()
            .all()
            .await
            .into_iter()
            .filter(|w| w.parent_id.is_none())
            .collect();
        roots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(roots)
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Scored<WorkItem>>> {
        search_table(&self.store, self.policy, self.store.work_items(), &request).await
    }
}

/// Architecture memory repository over the document store.
pub struct ArchitectureRepositoryImpl {
    store: Arc<DocumentStore>,
    policy: RetryPolicy,
}

impl ArchitectureRepositoryImpl {
    /// Wrap the shared store.
    #[must_use]
    pub fn new(store: Arc<DocumentStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }
}

#[async_trait]
impl jive_domain::ports::ArchitectureRepository for ArchitectureRepositoryImpl {
    async fn create(&self, item: ArchitectureItem) -> Result<ArchitectureItem> {
        let vector = vector_for(&self.store, self.policy, &item).await?;
        self.store.architecture().insert(item, vector).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ArchitectureItem>> {
        Ok(self.store.architecture().get(id).await)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<ArchitectureItem>> {
        Ok(self.store.architecture().get_by_slug(slug).await)
    }

    async fn update(&self, mut item: ArchitectureItem) -> Result<ArchitectureItem> {
        let previous = self
            .store
            .architecture()
            .get(item.id)
            .await
            .ok_or_else(|| Error::not_found(item.unique_slug.clone()))?;
        item.touch(time::now());
        let vector = if previous.embed_text() == item.embed_text() {
            None
        } else {
            vector_for(&self.store, self.policy, &item).await?
        };
        self.store.architecture().replace(item, vector).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.store.architecture().remove(id).await
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<ArchitectureItem>> {
        self.store.architecture().list(&query).await
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Scored<ArchitectureItem>>> {
        search_table(&self.store, self.policy, self.store.architecture(), &request).await
    }
}

/// Troubleshoot memory repository over the document store.
pub struct TroubleshootRepositoryImpl {
    store: Arc<DocumentStore>,
    policy: RetryPolicy,
}

impl TroubleshootRepositoryImpl {
    /// Wrap the shared store.
    #[must_use]
    pub fn new(store: Arc<DocumentStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }
}

#[async_trait]
impl jive_domain::ports::TroubleshootRepository for TroubleshootRepositoryImpl {
    async fn create(&self, item: TroubleshootItem) -> Result<TroubleshootItem> {
        let vector = vector_for(&self.store, self.policy, &item).await?;
        self.store.troubleshoot().insert(item, vector).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<TroubleshootItem>> {
        Ok(self.store.troubleshoot().get(id).await)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<TroubleshootItem>> {
        Ok(self.store.troubleshoot().get_by_slug(slug).await)
    }

    async fn update(&self, mut item: TroubleshootItem) -> Result<TroubleshootItem> {
        let previous = self
            .store
            .troubleshoot()
            .get(item.id)
            .await
            .ok_or_else(|| Error::not_found(item.unique_slug.clone()))?;
        item.touch(time::now());
        let vector = if previous.embed_text() == item.embed_text() {
            None
        } else {
            vector_for(&self.store, self.policy, &item).await?
        };
        self.store.troubleshoot().replace(item, vector).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.store.troubleshoot().remove(id).await
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<TroubleshootItem>> {
        self.store.troubleshoot().list(&query).await
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<Scored<TroubleshootItem>>> {
        search_table(&self.store, self.policy, self.store.troubleshoot(), &request).await
    }

    async fn increment_usage(&self, slug: &str, success: bool) -> Result<TroubleshootItem> {
        let mut item = self
            .store
            .troubleshoot()
            .get_by_slug(slug)
            .await
            .ok_or_else(|| Error::not_found(slug.to_owned()))?;
        item.usage_count += 1;
        if success {
            item.success_count += 1;
        }
        item.touch(time::now());
        // Counters do not feed the vector; keep the stored embedding
        self.store.troubleshoot().replace(item, None).await
    }
}

/// Execution record repository over the document store.
pub struct ExecutionRepositoryImpl {
    store: Arc<DocumentStore>,
}

impl ExecutionRepositoryImpl {
    /// Wrap the shared store.
    #[must_use]
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl jive_domain::ports::ExecutionRepository for ExecutionRepositoryImpl {
    async fn create(&self, record: ExecutionRecord) -> Result<ExecutionRecord> {
        self.store.executions().insert(record, None).await
    }

    async fn get(&self, execution_id: Uuid) -> Result<Option<ExecutionRecord>> {
        Ok(self.store.executions().get(execution_id).await)
    }

    async fn update(&self, record: ExecutionRecord) -> Result<ExecutionRecord> {
        self.store.executions().replace(record, None).await
    }

    async fn list_all(&self) -> Result<Vec<ExecutionRecord>> {
        Ok(self.store.executions().all().await)
    }
}
