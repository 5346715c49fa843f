//! Hierarchy traversal and parent/child type rules
//!
//! The hierarchy is a forest by construction; runtime guards (depth cap,
//! visited set) keep traversals terminating even over corrupted parent
//! links.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use jive_domain::entities::{WorkItem, WorkItemType, validate_parent_child};
use jive_domain::error::{Error, Result};
use jive_domain::ports::WorkItemRepository;

/// Depth cap on hierarchy walks; deeper chains are treated as corruption.
pub const MAX_DEPTH: usize = 32;

/// Hierarchy traversal service.
pub struct HierarchyService {
    work_items: Arc<dyn WorkItemRepository>,
}

impl HierarchyService {
    /// Create the service over the work item repository.
    #[must_use]
    pub fn new(work_items: Arc<dyn WorkItemRepository>) -> Self {
        Self { work_items }
    }

    /// Direct children, or the whole subtree when `recursive`.
    ///
    /// Traversal is an explicit work queue with a visited set and the
    /// [`MAX_DEPTH`] cap, so a corrupted `parent_id` cycle cannot hang it.
    ///
    /// # Errors
    ///
    /// `NotFound` when the root id does not exist; storage errors.
    pub async fn get_children(&self, id: Uuid, recursive: bool) -> Result<Vec<WorkItem>> {
        if self.work_items.get(id).await?.is_none() {
            return Err(Error::not_found(id.to_string()));
        }
        let mut result = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::from([id]);
        let mut queue: Vec<(Uuid, usize)> = vec![(id, 0)];

        while let Some((current, depth)) = queue.pop() {
            if depth >= MAX_DEPTH {
                tracing::warn!(root = %id, "hierarchy depth cap hit; possible parent_id cycle");
                continue;
            }
            for child in self.work_items.children_of(current).await? {
                if !visited.insert(child.id) {
                    continue;
                }
                if recursive {
                    queue.push((child.id, depth + 1));
                }
                result.push(child);
            }
            if !recursive {
                break;
            }
        }
        Ok(result)
    }

    /// Ancestors from the direct parent up to the root.
    ///
    /// # Errors
    ///
    /// `NotFound` when the starting id does not exist; storage errors.
    pub async fn get_ancestors(&self, id: Uuid) -> Result<Vec<WorkItem>> {
        let mut current = self
            .work_items
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(id.to_string()))?;
        let mut ancestors = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::from([id]);

        while let Some(parent_id) = current.parent_id {
            if ancestors.len() >= MAX_DEPTH || !visited.insert(parent_id) {
                tracing::warn!(item = %id, "ancestor walk aborted; possible parent_id cycle");
                break;
            }
            let Some(parent) = self.work_items.get(parent_id).await? else {
                break;
            };
            current = parent.clone();
            ancestors.push(parent);
        }
        Ok(ancestors)
    }

    /// Items with no parent.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn get_roots(&self) -> Result<Vec<WorkItem>> {
        self.work_items.roots().await
    }

    /// Validate that `child_type` may attach under `parent_id`.
    ///
    /// A missing parent is valid for every type except that an initiative
    /// must never have one; when present, the parent must exist and its
    /// type must appear in the allowed-parent set.
    ///
    /// # Errors
    ///
    /// `InvalidHierarchy` on a rule violation, `NotFound` for a dangling
    /// parent id.
    pub async fn validate_hierarchy(
        &self,
        child_type: WorkItemType,
        parent_id: Option<Uuid>,
    ) -> Result<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if child_type == WorkItemType::Initiative {
            return Err(Error::invalid_hierarchy(
                "initiative items must be hierarchy roots and cannot have a parent",
            ));
        }
        let parent = self
            .work_items
            .get(parent_id)
            .await?
            .ok_or_else(|| Error::not_found(parent_id.to_string()))?;
        validate_parent_child(parent.item_type, child_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jive_providers::retry::RetryPolicy;
    use jive_providers::{DocumentStore, HashEmbeddingProvider, WorkItemRepositoryImpl};

    async fn repo() -> Arc<dyn WorkItemRepository> {
        let store = Arc::new(
            DocumentStore::open(None, Arc::new(HashEmbeddingProvider::new()))
                .await
                .unwrap(),
        );
        Arc::new(WorkItemRepositoryImpl::new(store, RetryPolicy::immediate()))
    }

    async fn create(
        repo: &Arc<dyn WorkItemRepository>,
        item_type: WorkItemType,
        title: &str,
        parent: Option<Uuid>,
    ) -> WorkItem {
        let mut item = WorkItem::new(item_type, title.to_owned(), Utc::now());
        item.parent_id = parent;
        repo.create(item).await.unwrap()
    }

    #[tokio::test]
    async fn children_direct_and_recursive() {
        let repo = repo().await;
        let service = HierarchyService::new(Arc::clone(&repo));

        let initiative = create(&repo, WorkItemType::Initiative, "Init", None).await;
        let epic = create(&repo, WorkItemType::Epic, "Epic", Some(initiative.id)).await;
        let feature = create(&repo, WorkItemType::Feature, "Feat", Some(epic.id)).await;

        let direct = service.get_children(initiative.id, false).await.unwrap();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].id, epic.id);

        let all = service.get_children(initiative.id, true).await.unwrap();
        let ids: Vec<Uuid> = all.iter().map(|w| w.id).collect();
        assert!(ids.contains(&epic.id) && ids.contains(&feature.id));
    }

    #[tokio::test]
    async fn ancestors_walk_to_root() {
        let repo = repo().await;
        let service = HierarchyService::new(Arc::clone(&repo));

        let initiative = create(&repo, WorkItemType::Initiative, "Init", None).await;
        let epic = create(&repo, WorkItemType::Epic, "Epic", Some(initiative.id)).await;
        let feature = create(&repo, WorkItemType::Feature, "Feat", Some(epic.id)).await;

        let ancestors = service.get_ancestors(feature.id).await.unwrap();
        let ids: Vec<Uuid> = ancestors.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![epic.id, initiative.id]);
    }

    #[tokio::test]
    async fn type_rules_enforced_pre_insert() {
        let repo = repo().await;
        let service = HierarchyService::new(Arc::clone(&repo));

        let initiative = create(&repo, WorkItemType::Initiative, "Init", None).await;
        let epic = create(&repo, WorkItemType::Epic, "Epic", Some(initiative.id)).await;

        // epic → story skips feature
        let err = service
            .validate_hierarchy(WorkItemType::Story, Some(epic.id))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_HIERARCHY");

        service
            .validate_hierarchy(WorkItemType::Feature, Some(epic.id))
            .await
            .unwrap();

        let err = service
            .validate_hierarchy(WorkItemType::Initiative, Some(initiative.id))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_HIERARCHY");
    }

    #[tokio::test]
    async fn roots_lists_parentless_items() {
        let repo = repo().await;
        let service = HierarchyService::new(Arc::clone(&repo));
        let initiative = create(&repo, WorkItemType::Initiative, "Init", None).await;
        create(&repo, WorkItemType::Epic, "Epic", Some(initiative.id)).await;

        let roots = service.get_roots().await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, initiative.id);
    }
}
