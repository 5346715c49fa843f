//! Execution tracking
//!
//! Records execution attempts with monotonic lifecycle transitions and
//! cooperative cancellation. Records live in a process-wide map for the
//! life of the process and are persisted through the execution repository;
//! startup rehydrates the map from storage.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use jive_domain::entities::{ExecutionMode, ExecutionRecord, ExecutionStatus};
use jive_domain::error::{Error, Result};
use jive_domain::ports::{ExecutionRepository, WorkItemRepository};
use jive_domain::utils::time;

use super::dependency::{DependencyService, ValidationOptions};

/// Options for starting an execution.
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Scheduling mode
    pub mode: ExecutionMode,
    /// Opaque agent context stored on the record
    pub agent_context: serde_json::Value,
    /// Run dependency validation before starting (default true)
    pub validate_dependencies: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::DependencyBased,
            agent_context: serde_json::Value::Object(serde_json::Map::new()),
            validate_dependencies: true,
        }
    }
}

/// Execution tracker over the execution repository.
pub struct ExecutionService {
    work_items: Arc<dyn WorkItemRepository>,
    executions: Arc<dyn ExecutionRepository>,
    dependency: Arc<DependencyService>,
    records: DashMap<Uuid, ExecutionRecord>,
    cancel_tokens: DashMap<Uuid, CancellationToken>,
    progress_channels: DashMap<Uuid, watch::Sender<f64>>,
}

impl ExecutionService {
    /// Create the tracker.
    #[must_use]
    pub fn new(
        work_items: Arc<dyn WorkItemRepository>,
        executions: Arc<dyn ExecutionRepository>,
        dependency: Arc<DependencyService>,
    ) -> Self {
        Self {
            work_items,
            executions,
            dependency,
            records: DashMap::new(),
            cancel_tokens: DashMap::new(),
            progress_channels: DashMap::new(),
        }
    }

    /// Rehydrate the in-memory record map from storage.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn rehydrate(&self) -> Result<usize> {
        let stored = self.executions.list_all().await?;
        let count = stored.len();
        for record in stored {
            self.records.insert(record.execution_id, record);
        }
        Ok(count)
    }

    /// Start an execution for a work item.
    ///
    /// Optional preflight validates the work item's dependency subgraph and
    /// refuses to start on cycles or missing references. The record is
    /// created `pending` and immediately transitioned to `running`; progress
    /// and completion arrive through the tracker API.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown work item; `CircularDependency` /
    /// `MissingDependency` from preflight; storage errors.
    pub async fn start(&self, work_item_id: Uuid, options: StartOptions) -> Result<ExecutionRecord> {
        if self.work_items.get(work_item_id).await?.is_none() {
            return Err(Error::not_found(work_item_id.to_string()));
        }

        if options.validate_dependencies {
            // Preflight covers this work item and its transitive dependency
            // closure only; problems elsewhere in the graph do not block it
            let mut scope: Vec<Uuid> = self
                .dependency
                .get_dependencies(work_item_id, true, false)
                .await?
                .into_iter()
                .map(|item| item.id)
                .collect();
            scope.push(work_item_id);
            let validation = self
                .dependency
                .validate(ValidationOptions {
                    scope: Some(scope),
                    ..ValidationOptions::default()
                })
                .await?;
            if !validation.is_valid {
                use super::dependency::DependencyIssue;
                let detail = validation
                    .errors
                    .iter()
                    .map(|e| match e {
                        DependencyIssue::CircularDependency { message, .. }
                        | DependencyIssue::MissingDependency { message, .. } => message.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                let any_cycle = validation
                    .errors
                    .iter()
                    .any(|e| matches!(e, DependencyIssue::CircularDependency { .. }));
                let message = format!("Refusing to start execution: {detail}");
                return Err(if any_cycle {
                    Error::circular_dependency(message)
                } else {
                    Error::missing_dependency(message)
                });
            }
        }

        let mut record = ExecutionRecord::new(
            work_item_id,
            options.mode,
            options.agent_context,
            time::now(),
        );
        record.transition(ExecutionStatus::Running, time::now())?;

        let record = self.executions.create(record).await?;
        let (tx, _) = watch::channel(0.0f64);
        self.progress_channels.insert(record.execution_id, tx);
        self.cancel_tokens
            .insert(record.execution_id, CancellationToken::new());
        self.records.insert(record.execution_id, record.clone());

        tracing::info!(execution_id = %record.execution_id, work_item = %work_item_id, "execution started");
        Ok(record)
    }

    /// Current record for an execution.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown execution ids.
    pub fn status(&self, execution_id: Uuid) -> Result<ExecutionRecord> {
        self.records
            .get(&execution_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::not_found(execution_id.to_string()))
    }

    /// Subscribe to progress updates for an execution.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown execution ids.
    pub fn subscribe_progress(&self, execution_id: Uuid) -> Result<watch::Receiver<f64>> {
        self.progress_channels
            .get(&execution_id)
            .map(|tx| tx.subscribe())
            .ok_or_else(|| Error::not_found(execution_id.to_string()))
    }

    /// Cancellation token for a running execution, for cooperative checks.
    #[must_use]
    pub fn cancellation_token(&self, execution_id: Uuid) -> Option<CancellationToken> {
        self.cancel_tokens
            .get(&execution_id)
            .map(|t| t.value().clone())
    }

    /// Report intermediate progress on a running execution.
    ///
    /// # Errors
    ///
    /// Rejects updates on terminal records.
    pub async fn update_progress(&self, execution_id: Uuid, progress: f64) -> Result<ExecutionRecord> {
        let mut record = self.status(execution_id)?;
        if record.status.is_terminal() {
            return Err(Error::validation(format!(
                "Execution {execution_id} is {} and no longer accepts progress",
                record.status
            )));
        }
        record.progress_percentage = progress.clamp(0.0, 100.0);
        let record = self.persist(record).await?;
        if let Some(tx) = self.progress_channels.get(&execution_id) {
            let _ = tx.send(record.progress_percentage);
        }
        Ok(record)
    }

    /// Finish an execution as completed or failed.
    ///
    /// # Errors
    ///
    /// Rejects transitions the state machine forbids.
    pub async fn finish(
        &self,
        execution_id: Uuid,
        success: bool,
        error_message: Option<String>,
    ) -> Result<ExecutionRecord> {
        let mut record = self.status(execution_id)?;
        let target = if success {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        record.transition(target, time::now())?;
        record.error_message = error_message;
        let record = self.persist(record).await?;
        self.finalize_handles(execution_id);
        Ok(record)
    }

    /// Cancel an execution, storing the reason.
    ///
    /// Refuses terminal records unless `force`; a forced cancel of a
    /// terminal record is a no-op that returns the record unchanged.
    ///
    /// # Errors
    ///
    /// `Validation` when already terminal and not forced.
    pub async fn cancel(
        &self,
        execution_id: Uuid,
        reason: &str,
        force: bool,
    ) -> Result<ExecutionRecord> {
        let mut record = self.status(execution_id)?;
        if record.status.is_terminal() {
            if force {
                return Ok(record);
            }
            return Err(Error::validation(format!(
                "Execution {execution_id} already finished as {}",
                record.status
            )));
        }

        if let Some(token) = self.cancel_tokens.get(&execution_id) {
            token.cancel();
        }
        record.transition(ExecutionStatus::Cancelled, time::now())?;
        record.error_message = Some(reason.to_owned());
        let record = self.persist(record).await?;
        self.finalize_handles(execution_id);
        tracing::info!(execution_id = %execution_id, reason, "execution cancelled");
        Ok(record)
    }

    /// All tracked records.
    #[must_use]
    pub fn list(&self) -> Vec<ExecutionRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    async fn persist(&self, record: ExecutionRecord) -> Result<ExecutionRecord> {
        let record = self.executions.update(record).await?;
        self.records.insert(record.execution_id, record.clone());
        Ok(record)
    }

    fn finalize_handles(&self, execution_id: Uuid) {
        self.cancel_tokens.remove(&execution_id);
        self.progress_channels.remove(&execution_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jive_domain::entities::{WorkItem, WorkItemType};
    use jive_providers::retry::RetryPolicy;
    use jive_providers::{
        DocumentStore, ExecutionRepositoryImpl, HashEmbeddingProvider, WorkItemRepositoryImpl,
    };

    struct Fixture {
        repo: Arc<dyn WorkItemRepository>,
        service: ExecutionService,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(
            DocumentStore::open(None, Arc::new(HashEmbeddingProvider::new()))
                .await
                .unwrap(),
        );
        let repo: Arc<dyn WorkItemRepository> = Arc::new(WorkItemRepositoryImpl::new(
            Arc::clone(&store),
            RetryPolicy::immediate(),
        ));
        let executions: Arc<dyn ExecutionRepository> =
            Arc::new(ExecutionRepositoryImpl::new(store));
        let dependency = Arc::new(DependencyService::new(Arc::clone(&repo)));
        Fixture {
            service: ExecutionService::new(Arc::clone(&repo), executions, dependency),
            repo,
        }
    }

    async fn work_item(repo: &Arc<dyn WorkItemRepository>, deps: Vec<Uuid>) -> WorkItem {
        let mut item = WorkItem::new(WorkItemType::Task, "Exec me".to_owned(), Utc::now());
        item.dependencies = deps;
        repo.create(item).await.unwrap()
    }

    #[tokio::test]
    async fn start_status_finish_lifecycle() {
        let f = fixture().await;
        let item = work_item(&f.repo, vec![]).await;

        let record = f.service.start(item.id, StartOptions::default()).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Running);

        f.service
            .update_progress(record.execution_id, 40.0)
            .await
            .unwrap();
        assert_eq!(
            f.service.status(record.execution_id).unwrap().progress_percentage,
            40.0
        );

        let done = f
            .service
            .finish(record.execution_id, true, None)
            .await
            .unwrap();
        assert_eq!(done.status, ExecutionStatus::Completed);
        assert_eq!(done.progress_percentage, 100.0);
        assert!(done.end_time.is_some());
    }

    #[tokio::test]
    async fn preflight_refuses_cyclic_graph() {
        let f = fixture().await;
        let a = work_item(&f.repo, vec![]).await;
        let mut b = work_item(&f.repo, vec![a.id]).await;
        // Close the cycle a -> b
        let mut a_cyclic = f.repo.get(a.id).await.unwrap().unwrap();
        a_cyclic.dependencies = vec![b.id];
        f.repo.update(a_cyclic).await.unwrap();
        b = f.repo.get(b.id).await.unwrap().unwrap();

        let err = f
            .service
            .start(b.id, StartOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CIRCULAR_DEPENDENCY");

        // Opting out of preflight starts anyway
        let record = f
            .service
            .start(
                b.id,
                StartOptions {
                    validate_dependencies: false,
                    ..StartOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn preflight_ignores_cycles_outside_the_dependency_closure() {
        let f = fixture().await;
        let a = work_item(&f.repo, vec![]).await;
        let b = work_item(&f.repo, vec![a.id]).await;
        let mut a_cyclic = f.repo.get(a.id).await.unwrap().unwrap();
        a_cyclic.dependencies = vec![b.id];
        f.repo.update(a_cyclic).await.unwrap();

        // The cycle between a and b does not block an unrelated item
        let unrelated = work_item(&f.repo, vec![]).await;
        let record = f
            .service
            .start(unrelated.id, StartOptions::default())
            .await
            .unwrap();
        assert_eq!(record.status, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn cancel_sets_reason_and_is_final() {
        let f = fixture().await;
        let item = work_item(&f.repo, vec![]).await;
        let record = f.service.start(item.id, StartOptions::default()).await.unwrap();
        let token = f.service.cancellation_token(record.execution_id).unwrap();

        let cancelled = f
            .service
            .cancel(record.execution_id, "operator abort", false)
            .await
            .unwrap();
        assert_eq!(cancelled.status, ExecutionStatus::Cancelled);
        assert_eq!(cancelled.error_message.as_deref(), Some("operator abort"));
        assert!(cancelled.end_time.is_some());
        assert!(token.is_cancelled());

        // Second cancel refuses without force, no-ops with it
        let err = f
            .service
            .cancel(record.execution_id, "again", false)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        let forced = f
            .service
            .cancel(record.execution_id, "again", true)
            .await
            .unwrap();
        assert_eq!(forced.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn progress_subscription_receives_updates() {
        let f = fixture().await;
        let item = work_item(&f.repo, vec![]).await;
        let record = f.service.start(item.id, StartOptions::default()).await.unwrap();

        let mut rx = f.service.subscribe_progress(record.execution_id).unwrap();
        f.service
            .update_progress(record.execution_id, 75.0)
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 75.0);
    }

    #[tokio::test]
    async fn rehydrate_restores_records() {
        let f = fixture().await;
        let item = work_item(&f.repo, vec![]).await;
        let record = f.service.start(item.id, StartOptions::default()).await.unwrap();

        // A fresh service over the same repositories sees the record after
        // rehydration
        let store_records = f.service.executions.list_all().await.unwrap();
        assert_eq!(store_records.len(), 1);

        let fresh = ExecutionService::new(
            Arc::clone(&f.service.work_items),
            Arc::clone(&f.service.executions),
            Arc::clone(&f.service.dependency),
        );
        assert!(fresh.status(record.execution_id).is_err());
        fresh.rehydrate().await.unwrap();
        assert_eq!(
            fresh.status(record.execution_id).unwrap().execution_id,
            record.execution_id
        );
    }
}
