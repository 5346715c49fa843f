//! Unified progress calculation and upward propagation
//!
//! Status and progress are dual representations. Leaves derive progress from
//! status; parents average their children; updates optionally propagate to
//! the root. Subtree recalculation only writes items whose computed value
//! moved by more than [`PROGRESS_EPSILON`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use jive_domain::entities::{WorkItem, WorkItemStatus};
use jive_domain::error::{Error, Result};
use jive_domain::ports::WorkItemRepository;
use jive_domain::utils::time;

use super::hierarchy::MAX_DEPTH;

/// Smallest progress delta worth writing back.
pub const PROGRESS_EPSILON: f64 = 0.01;

/// A progress/status update request.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    /// Explicit progress percentage, clamped to [0, 100]
    pub progress: Option<f64>,
    /// Explicit status
    pub status: Option<WorkItemStatus>,
    /// Walk the ancestor chain after the write (default true)
    pub propagate: bool,
}

/// Result of an update, with every touched item.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    /// The directly updated work item
    pub work_item: WorkItem,
    /// Ids written during the operation, updated item first
    pub affected_ids: Vec<Uuid>,
    /// Non-fatal notes (e.g. caller-provided inconsistent pair)
    pub warnings: Vec<String>,
}

/// Result of a subtree recalculation.
#[derive(Debug, Clone, Serialize)]
pub struct RecalculationReport {
    /// Items whose stored progress was rewritten
    pub updated_ids: Vec<Uuid>,
    /// Items visited
    pub checked: usize,
}

/// Progress calculator and propagator.
pub struct ProgressService {
    work_items: Arc<dyn WorkItemRepository>,
}

impl ProgressService {
    /// Create the service over the work item repository.
    #[must_use]
    pub fn new(work_items: Arc<dyn WorkItemRepository>) -> Self {
        Self { work_items }
    }

    /// Computed progress of `item`: leaves from status, parents from the
    /// mean of their children.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn calculate(&self, id: Uuid) -> Result<f64> {
        let item = self
            .work_items
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(id.to_string()))?;
        let children = self.work_items.children_of(id).await?;
        if children.is_empty() {
            return Ok(leaf_progress(&item));
        }
        self.mean_child_progress(&children, 0).await
    }

    /// Apply a progress/status update per the derivation rules.
    ///
    /// - Only `status`: progress is derived from the leaf table; terminal
    ///   statuses stamp `completed_at`.
    /// - Only `progress`: clamped, status derived (100 → completed, >0 →
    ///   in_progress, 0 → not_started).
    /// - Both: stored as provided; an inconsistent pair is kept but recorded
    ///   as a warning.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids; storage errors.
    pub async fn update(&self, id: Uuid, update: ProgressUpdate) -> Result<ProgressReport> {
        let mut item = self
            .work_items
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(id.to_string()))?;
        let mut warnings = Vec::new();
        let now = time::now();

        match (update.progress, update.status) {
            (None, Some(status)) => {
                item.status = status;
                item.progress_percentage = status.leaf_progress();
                if status.is_terminal() {
                    item.completed_at = Some(now);
                }
            }
            (Some(progress), None) => {
                let clamped = progress.clamp(0.0, 100.0);
                item.progress_percentage = clamped;
                item.status = WorkItemStatus::from_progress(clamped);
                if item.status.is_terminal() {
                    item.completed_at = Some(now);
                }
            }
            (Some(progress), Some(status)) => {
                let clamped = progress.clamp(0.0, 100.0);
                let consistent = ((clamped - 100.0).abs() < f64::EPSILON)
                    == (status == WorkItemStatus::Completed);
                if !consistent {
                    warnings.push(format!(
                        "status '{status}' and progress {clamped} are inconsistent; stored as provided"
                    ));
                    // Keep the pair storable: completed wins the duality
                    if status == WorkItemStatus::Completed {
                        item.progress_percentage = 100.0;
                    } else {
                        item.progress_percentage = clamped.min(99.0);
                    }
                } else {
                    item.progress_percentage = clamped;
                }
                item.status = status;
                if status.is_terminal() {
                    item.completed_at = Some(now);
                }
            }
            (None, None) => {
                return Err(Error::validation(
                    "Progress update requires a status or a progress value",
                ));
            }
        }

        let item = self.work_items.update(item).await?;
        let mut affected_ids = vec![item.id];

        if update.propagate {
            let updated_parents = self.propagate_from(item.id).await?;
            affected_ids.extend(updated_parents);
        }

        Ok(ProgressReport {
            work_item: item,
            affected_ids,
            warnings,
        })
    }

    /// Recalculate a subtree bottom-up, writing only meaningful deltas.
    ///
    /// With `root = None` every root is recalculated. Running it twice in a
    /// row performs no writes on the second pass.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown root; storage errors.
    pub async fn recalculate(&self, root: Option<Uuid>) -> Result<RecalculationReport> {
        let roots = match root {
            Some(id) => vec![
                self.work_items
                    .get(id)
                    .await?
                    .ok_or_else(|| Error::not_found(id.to_string()))?,
            ],
            None => self.work_items.roots().await?,
        };

        let mut updated_ids = Vec::new();
        let mut checked = 0;
        for item in roots {
            self.recalculate_subtree(&item, 0, &mut updated_ids, &mut checked)
                .await?;
        }
        Ok(RecalculationReport {
            updated_ids,
            checked,
        })
    }

    /// Aggregate progress counts for a report over a set of items.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn report(&self) -> Result<serde_json::Value> {
        let items = self.work_items.list_all().await?;
        let mut by_status: HashMap<String, usize> = HashMap::new();
        let mut total_progress = 0.0;
        for item in &items {
            *by_status.entry(item.status.to_string()).or_default() += 1;
            total_progress += item.progress_percentage;
        }
        let average = if items.is_empty() {
            0.0
        } else {
            total_progress / items.len() as f64
        };
        Ok(serde_json::json!({
            "total_items": items.len(),
            "by_status": by_status,
            "average_progress": average,
        }))
    }

    /// Mean progress over `children`, recursing into parent children.
    ///
    /// A leaf aggregated here always contributes its pure status-table
    /// value, never an explicit stored progress, so status and progress
    /// stay consistent across the parent mean.
    async fn mean_child_progress(&self, children: &[WorkItem], depth: usize) -> Result<f64> {
        if children.is_empty() || depth >= MAX_DEPTH {
            return Ok(0.0);
        }
        let mut total = 0.0;
        for child in children {
            let grandchildren = self.work_items.children_of(child.id).await?;
            let progress = if grandchildren.is_empty() {
                child.status.leaf_progress()
            } else {
                Box::pin(self.mean_child_progress(&grandchildren, depth + 1)).await?
            };
            total += progress;
        }
        Ok(total / children.len() as f64)
    }

    /// Walk the ancestor chain, recomputing progress and status.
    async fn propagate_from(&self, start: Uuid) -> Result<Vec<Uuid>> {
        let mut updated = Vec::new();
        let mut current = start;
        let mut hops = 0;

        while hops < MAX_DEPTH {
            hops += 1;
            let Some(item) = self.work_items.get(current).await? else {
                break;
            };
            let Some(parent_id) = item.parent_id else {
                break;
            };
            let Some(mut parent) = self.work_items.get(parent_id).await? else {
                break;
            };
            let children = self.work_items.children_of(parent_id).await?;
            if children.is_empty() {
                break;
            }

            let new_progress = self.mean_child_progress(&children, 0).await?;
            let all_terminal = children.iter().all(|c| c.status.is_terminal());
            let all_completed = children
                .iter()
                .all(|c| c.status == WorkItemStatus::Completed);
            let any_in_progress = children
                .iter()
                .any(|c| c.status == WorkItemStatus::InProgress);

            let new_status = if all_completed && new_progress >= 100.0 - PROGRESS_EPSILON {
                WorkItemStatus::Completed
            } else if parent.status == WorkItemStatus::Completed && all_terminal {
                // Completed parents stay completed while children remain terminal
                WorkItemStatus::Completed
            } else if any_in_progress || new_progress > 0.0 {
                WorkItemStatus::InProgress
            } else {
                parent.status
            };

            let progress_changed =
                (parent.progress_percentage - new_progress).abs() > PROGRESS_EPSILON;
            let status_changed = parent.status != new_status;
            if progress_changed || status_changed {
                parent.progress_percentage = if new_status == WorkItemStatus::Completed {
                    100.0
                } else {
                    new_progress.min(99.99)
                };
                if status_changed && new_status.is_terminal() {
                    parent.completed_at = Some(time::now());
                }
                parent.status = new_status;
                self.work_items.update(parent).await?;
                updated.push(parent_id);
            }
            current = parent_id;
        }
        Ok(updated)
    }

    /// Post-order recalculation of one subtree.
    async fn recalculate_subtree(
        &self,
        item: &WorkItem,
        depth: usize,
        updated_ids: &mut Vec<Uuid>,
        checked: &mut usize,
    ) -> Result<()> {
        if depth >= MAX_DEPTH {
            return Ok(());
        }
        *checked += 1;
        let children = self.work_items.children_of(item.id).await?;
        for child in &children {
            Box::pin(self.recalculate_subtree(child, depth + 1, updated_ids, checked)).await?;
        }

        let computed = if children.is_empty() {
            leaf_progress(item)
        } else {
            // Children were just rewritten; read fresh values
            let fresh = self.work_items.children_of(item.id).await?;
            self.mean_child_progress(&fresh, 0).await?
        };

        if (item.progress_percentage - computed).abs() > PROGRESS_EPSILON {
            let mut updated = self
                .work_items
                .get(item.id)
                .await?
                .ok_or_else(|| Error::not_found(item.id.to_string()))?;
            updated.progress_percentage = computed;
            // Keep the duality: 100% forces completed, less forces it off
            if computed >= 100.0 - PROGRESS_EPSILON {
                updated.progress_percentage = 100.0;
                updated.status = WorkItemStatus::Completed;
            } else if updated.status == WorkItemStatus::Completed {
                updated.status = WorkItemStatus::InProgress;
            }
            self.work_items.update(updated).await?;
            updated_ids.push(item.id);
        }
        Ok(())
    }
}

/// Leaf progress: explicit stored progress wins for non-terminal statuses,
/// otherwise the status table applies.
fn leaf_progress(item: &WorkItem) -> f64 {
    match item.status {
        WorkItemStatus::InProgress if item.progress_percentage > 0.0 => item.progress_percentage,
        status => status.leaf_progress(),
    }
}
