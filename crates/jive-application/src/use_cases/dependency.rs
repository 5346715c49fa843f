//! Dependency graph validation and execution ordering
//!
//! The dependency graph is a DAG by runtime validation: edge `a → b` means
//! "a is blocked by b". Cycles are found with Tarjan's strongly-connected
//! components; execution order is Kahn's algorithm with a deterministic
//! `(priority desc, created_at asc)` tie-break. Validation failures are
//! reported inside the result, never thrown.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use uuid::Uuid;

use jive_domain::entities::{Priority, WorkItem, WorkItemStatus};
use jive_domain::error::Result;
use jive_domain::ports::WorkItemRepository;

/// One reported validation problem.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyIssue {
    /// A dependency cycle; `cycle` lists the ids with the first repeated last
    CircularDependency {
        /// Human-readable description
        message: String,
        /// Cycle witness
        cycle: Vec<Uuid>,
    },
    /// A dependency pointing at a nonexistent work item
    MissingDependency {
        /// Human-readable description
        message: String,
        /// The item declaring the dependency
        work_item_id: Uuid,
        /// The dangling reference
        missing_id: Uuid,
    },
}

/// A proposed repair for a reported issue.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SuggestedFix {
    /// Remove one edge to break a cycle
    RemoveDependency {
        /// The item whose dependency should be dropped
        work_item_id: Uuid,
        /// The dependency to drop
        dependency_id: Uuid,
        /// Why this edge was chosen
        reason: String,
    },
    /// Delete a dangling reference
    RemoveMissingReference {
        /// The item whose dependency should be dropped
        work_item_id: Uuid,
        /// The dangling id
        missing_id: Uuid,
    },
}

/// Outcome of a validation run.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyValidation {
    /// True when no issue was found
    pub is_valid: bool,
    /// Every detected problem
    pub errors: Vec<DependencyIssue>,
    /// Topological execution order; absent when the graph has a cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_order: Option<Vec<Uuid>>,
    /// Proposed repairs, when requested
    pub suggested_fixes: Vec<SuggestedFix>,
}

/// Shape statistics over the dependency graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    /// Number of work items considered
    pub nodes: usize,
    /// Number of dependency edges
    pub edges: usize,
    /// Items nothing depends on
    pub roots: usize,
    /// Items with no dependencies
    pub leaves: usize,
    /// Longest dependency chain (0 for an empty graph)
    pub max_depth: usize,
}

/// Options for a validation run.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Restrict validation to these ids and their edges
    pub scope: Option<Vec<Uuid>>,
    /// Detect cycles
    pub check_circular: bool,
    /// Detect dangling references
    pub check_missing: bool,
    /// Propose repairs
    pub suggest_fixes: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            scope: None,
            check_circular: true,
            check_missing: true,
            suggest_fixes: false,
        }
    }
}

/// Dependency engine over the work item repository.
pub struct DependencyService {
    work_items: Arc<dyn WorkItemRepository>,
}

impl DependencyService {
    /// Create the service over the work item repository.
    #[must_use]
    pub fn new(work_items: Arc<dyn WorkItemRepository>) -> Self {
        Self { work_items }
    }

    /// Dependencies of `id`, optionally transitive, optionally only those
    /// still blocking (status not completed).
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id; storage errors.
    pub async fn get_dependencies(
        &self,
        id: Uuid,
        transitive: bool,
        only_blocking: bool,
    ) -> Result<Vec<WorkItem>> {
        let items = self.work_items.list_all().await?;
        let by_id: HashMap<Uuid, &WorkItem> = items.iter().map(|w| (w.id, w)).collect();
        if !by_id.contains_key(&id) {
            return Err(jive_domain::Error::not_found(id.to_string()));
        }

        // DFS with a visited set; the transitive closure is never persisted
        let mut visited: HashSet<Uuid> = HashSet::from([id]);
        let mut stack = vec![id];
        let mut result = Vec::new();
        while let Some(current) = stack.pop() {
            let Some(item) = by_id.get(&current) else {
                continue;
            };
            for dep_id in &item.dependencies {
                if !visited.insert(*dep_id) {
                    continue;
                }
                if let Some(dep) = by_id.get(dep_id) {
                    if transitive {
                        stack.push(*dep_id);
                    }
                    if !only_blocking || dep.status != WorkItemStatus::Completed {
                        result.push((*dep).clone());
                    }
                }
            }
            if !transitive {
                break;
            }
        }
        Ok(result)
    }

    /// Validate the dependency graph.
    ///
    /// # Errors
    ///
    /// Storage errors only; graph problems are reported in the result.
    pub async fn validate(&self, options: ValidationOptions) -> Result<DependencyValidation> {
        let items = self.scoped_items(options.scope.as_deref()).await?;
        let by_id: HashMap<Uuid, &WorkItem> = items.iter().map(|w| (w.id, w)).collect();

        let mut errors = Vec::new();
        let mut suggested_fixes = Vec::new();

        if options.check_missing {
            for item in &items {
                for dep_id in &item.dependencies {
                    if !by_id.contains_key(dep_id) {
                        errors.push(DependencyIssue::MissingDependency {
                            message: format!(
                                "Work item '{}' depends on nonexistent item {dep_id}",
                                item.title
                            ),
                            work_item_id: item.id,
                            missing_id: *dep_id,
                        });
                        if options.suggest_fixes {
                            suggested_fixes.push(SuggestedFix::RemoveMissingReference {
                                work_item_id: item.id,
                                missing_id: *dep_id,
                            });
                        }
                    }
                }
            }
        }

        let mut has_cycle = false;
        if options.check_circular {
            for cycle in find_cycles(&items) {
                has_cycle = true;
                if options.suggest_fixes {
                    if let Some(fix) = propose_cycle_fix(&cycle, &by_id) {
                        suggested_fixes.push(fix);
                    }
                }
                let witness = cycle
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> ");
                errors.push(DependencyIssue::CircularDependency {
                    message: format!("Dependency cycle detected: {witness}"),
                    cycle,
                });
            }
        }

        let execution_order = if has_cycle {
            None
        } else {
            Some(execution_order(&items))
        };

        Ok(DependencyValidation {
            is_valid: errors.is_empty(),
            errors,
            execution_order,
            suggested_fixes,
        })
    }

    /// Shape statistics for the whole graph.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub async fn graph_stats(&self) -> Result<GraphStats> {
        let items = self.work_items.list_all().await?;
        let by_id: HashSet<Uuid> = items.iter().map(|w| w.id).collect();

        let mut edges = 0;
        let mut depended_on: HashSet<Uuid> = HashSet::new();
        for item in &items {
            for dep in item.dependencies.iter().filter(|d| by_id.contains(d)) {
                edges += 1;
                depended_on.insert(*dep);
            }
        }
        let roots = items.iter().filter(|w| !depended_on.contains(&w.id)).count();
        let leaves = items
            .iter()
            .filter(|w| w.dependencies.iter().all(|d| !by_id.contains(d)))
            .count();

        Ok(GraphStats {
            nodes: items.len(),
            edges,
            roots,
            leaves,
            max_depth: max_chain_depth(&items),
        })
    }

    async fn scoped_items(&self, scope: Option<&[Uuid]>) -> Result<Vec<WorkItem>> {
        let items = self.work_items.list_all().await?;
        Ok(match scope {
            None => items,
            Some(ids) => {
                let wanted: HashSet<&Uuid> = ids.iter().collect();
                items
                    .into_iter()
                    .filter(|w| wanted.contains(&w.id))
                    .collect()
            }
        })
    }
}

/// Cycles in the graph: every Tarjan SCC of size > 1 plus each self-edge.
/// The witness repeats the first node at the end.
fn find_cycles(items: &[WorkItem]) -> Vec<Vec<Uuid>> {
    let mut graph: DiGraph<Uuid, ()> = DiGraph::new();
    let mut index_of: HashMap<Uuid, NodeIndex> = HashMap::new();
    for item in items {
        index_of.insert(item.id, graph.add_node(item.id));
    }
    for item in items {
        for dep in &item.dependencies {
            if let (Some(&from), Some(&to)) = (index_of.get(&item.id), index_of.get(dep)) {
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut cycles = Vec::new();
    for component in tarjan_scc(&graph) {
        if component.len() > 1 {
            let mut cycle: Vec<Uuid> = component.iter().map(|idx| graph[*idx]).collect();
            cycle.sort();
            if let Some(first) = cycle.first().copied() {
                cycle.push(first);
            }
            cycles.push(cycle);
        }
    }
    for item in items {
        if item.dependencies.contains(&item.id) {
            cycles.push(vec![item.id, item.id]);
        }
    }
    cycles
}

/// Break a cycle by dropping the edge leaving its lowest-priority member.
fn propose_cycle_fix(cycle: &[Uuid], by_id: &HashMap<Uuid, &WorkItem>) -> Option<SuggestedFix> {
    let members: HashSet<&Uuid> = cycle.iter().collect();
    let weakest = cycle
        .iter()
        .filter_map(|id| by_id.get(id))
        .min_by_key(|w| (w.priority, Reverse(w.created_at)))?;
    let dependency_id = weakest
        .dependencies
        .iter()
        .find(|d| members.contains(d))
        .copied()?;
    Some(SuggestedFix::RemoveDependency {
        work_item_id: weakest.id,
        dependency_id,
        reason: format!(
            "'{}' has the lowest priority in the cycle ({})",
            weakest.title, weakest.priority
        ),
    })
}

/// Kahn's algorithm with a `(priority desc, created_at asc, id asc)` heap
/// tie-break: a linear extension where `b` precedes `a` for every edge
/// `a → b` ("a blocked by b").
fn execution_order(items: &[WorkItem]) -> Vec<Uuid> {
    let by_id: HashMap<Uuid, &WorkItem> = items.iter().map(|w| (w.id, w)).collect();

    // in-degree counts the unfinished dependencies of each item
    let mut in_degree: HashMap<Uuid, usize> = HashMap::new();
    let mut dependents: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for item in items {
        let degree = item
            .dependencies
            .iter()
            .filter(|d| by_id.contains_key(d))
            .count();
        in_degree.insert(item.id, degree);
        for dep in item.dependencies.iter().filter(|d| by_id.contains_key(d)) {
            dependents.entry(*dep).or_default().push(item.id);
        }
    }

    #[derive(PartialEq, Eq)]
    struct Ready {
        priority: Priority,
        created_at: Reverse<chrono::DateTime<chrono::Utc>>,
        id: Reverse<Uuid>,
    }
    impl Ord for Ready {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            (self.priority, self.created_at, self.id).cmp(&(
                other.priority,
                other.created_at,
                other.id,
            ))
        }
    }
    impl PartialOrd for Ready {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    let ready_entry = |id: Uuid| {
        by_id.get(&id).map(|w| Ready {
            priority: w.priority,
            created_at: Reverse(w.created_at),
            id: Reverse(id),
        })
    };
    let mut heap: BinaryHeap<Ready> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .filter_map(|(id, _)| ready_entry(*id))
        .collect();

    let mut order = Vec::with_capacity(items.len());
    while let Some(next) = heap.pop() {
        let id = next.id.0;
        order.push(id);
        for dependent in dependents.get(&id).cloned().unwrap_or_default() {
            if let Some(degree) = in_degree.get_mut(&dependent) {
                *degree -= 1;
                if *degree == 0 {
                    if let Some(entry) = ready_entry(dependent) {
                        heap.push(entry);
                    }
                }
            }
        }
    }
    order
}

/// Longest dependency chain length, measured in edges.
fn max_chain_depth(items: &[WorkItem]) -> usize {
    let by_id: HashMap<Uuid, &WorkItem> = items.iter().map(|w| (w.id, w)).collect();
    let mut memo: HashMap<Uuid, usize> = HashMap::new();

    fn depth_of(
        id: Uuid,
        by_id: &HashMap<Uuid, &WorkItem>,
        memo: &mut HashMap<Uuid, usize>,
        guard: &mut HashSet<Uuid>,
    ) -> usize {
        if let Some(cached) = memo.get(&id) {
            return *cached;
        }
        if !guard.insert(id) {
            // Cycle guard: report zero rather than recursing forever
            return 0;
        }
        let depth = by_id
            .get(&id)
            .map(|item| {
                item.dependencies
                    .iter()
                    .filter(|d| by_id.contains_key(d))
                    .map(|d| depth_of(*d, by_id, memo, guard) + 1)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        guard.remove(&id);
        memo.insert(id, depth);
        depth
    }

    let mut guard = HashSet::new();
    items
        .iter()
        .map(|w| depth_of(w.id, &by_id, &mut memo, &mut guard))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jive_domain::entities::{WorkItemStatus, WorkItemType};
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

    async fn task(repo: &Arc<dyn WorkItemRepository>, title: &str, deps: Vec<Uuid>) -> WorkItem {
        let mut item = WorkItem::new(WorkItemType::Task, title.to_owned(), Utc::now());
        item.dependencies = deps;
        repo.create(item).await.unwrap()
    }

    #[tokio::test]
    async fn cycle_is_reported_with_witness_and_no_order() {
        let repo = repo().await;
        let service = DependencyService::new(Arc::clone(&repo));

        let c = task(&repo, "C", vec![]).await;
        let b = task(&repo, "B", vec![c.id]).await;
        let a = task(&repo, "A", vec![b.id]).await;
        // Close the loop: C -> A
        let mut c_cyclic = c.clone();
        c_cyclic.dependencies = vec![a.id];
        repo.update(c_cyclic).await.unwrap();

        let result = service.validate(ValidationOptions::default()).await.unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.execution_order.is_none());
        match &result.errors[0] {
            DependencyIssue::CircularDependency { cycle, .. } => {
                assert_eq!(cycle.len(), 4);
                assert_eq!(cycle.first(), cycle.last());
                for id in [a.id, b.id, c.id] {
                    assert!(cycle.contains(&id));
                }
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn acyclic_graph_orders_dependencies_first() {
        let repo = repo().await;
        let service = DependencyService::new(Arc::clone(&repo));

        let c = task(&repo, "C", vec![]).await;
        let b = task(&repo, "B", vec![c.id]).await;
        let a = task(&repo, "A", vec![b.id]).await;

        let result = service.validate(ValidationOptions::default()).await.unwrap();
        assert!(result.is_valid);
        assert_eq!(result.execution_order, Some(vec![c.id, b.id, a.id]));
    }

    #[tokio::test]
    async fn order_is_a_linear_extension() {
        let repo = repo().await;
        let service = DependencyService::new(Arc::clone(&repo));

        let base = task(&repo, "base", vec![]).await;
        let mid1 = task(&repo, "mid1", vec![base.id]).await;
        let mid2 = task(&repo, "mid2", vec![base.id]).await;
        let top = task(&repo, "top", vec![mid1.id, mid2.id]).await;

        let result = service.validate(ValidationOptions::default()).await.unwrap();
        let order = result.execution_order.unwrap();
        let pos: HashMap<Uuid, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        // For every edge a -> b, b precedes a
        for (item, dep) in [
            (mid1.id, base.id),
            (mid2.id, base.id),
            (top.id, mid1.id),
            (top.id, mid2.id),
        ] {
            assert!(pos[&dep] < pos[&item]);
        }
    }

    #[tokio::test]
    async fn missing_reference_reported_with_fix() {
        let repo = repo().await;
        let service = DependencyService::new(Arc::clone(&repo));
        let ghost = Uuid::new_v4();
        let item = task(&repo, "Orphaned", vec![ghost]).await;

        let result = service
            .validate(ValidationOptions {
                suggest_fixes: true,
                ..ValidationOptions::default()
            })
            .await
            .unwrap();
        assert!(!result.is_valid);
        assert!(matches!(
            &result.errors[0],
            DependencyIssue::MissingDependency { missing_id, work_item_id, .. }
                if *missing_id == ghost && *work_item_id == item.id
        ));
        assert!(matches!(
            &result.suggested_fixes[0],
            SuggestedFix::RemoveMissingReference { missing_id, .. } if *missing_id == ghost
        ));
    }

    #[tokio::test]
    async fn blocking_dependencies_exclude_completed() {
        let repo = repo().await;
        let service = DependencyService::new(Arc::clone(&repo));

        let mut done = task(&repo, "done", vec![]).await;
        done.status = WorkItemStatus::Completed;
        done.progress_percentage = 100.0;
        let done = repo.update(done).await.unwrap();
        let open = task(&repo, "open", vec![]).await;
        let top = task(&repo, "top", vec![done.id, open.id]).await;

        let all = service
            .get_dependencies(top.id, false, false)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        let blocking = service.get_dependencies(top.id, false, true).await.unwrap();
        assert_eq!(blocking.len(), 1);
        assert_eq!(blocking[0].id, open.id);
    }

    #[tokio::test]
    async fn transitive_dependencies_expand_with_visited_set() {
        let repo = repo().await;
        let service = DependencyService::new(Arc::clone(&repo));

        let deep = task(&repo, "deep", vec![]).await;
        let mid = task(&repo, "mid", vec![deep.id]).await;
        let top = task(&repo, "top", vec![mid.id]).await;

        let direct = service
            .get_dependencies(top.id, false, false)
            .await
            .unwrap();
        assert_eq!(direct.len(), 1);
        let transitive = service.get_dependencies(top.id, true, false).await.unwrap();
        assert_eq!(transitive.len(), 2);
    }

    #[tokio::test]
    async fn graph_stats_shape() {
        let repo = repo().await;
        let service = DependencyService::new(Arc::clone(&repo));
        let base = task(&repo, "base", vec![]).await;
        let mid = task(&repo, "mid", vec![base.id]).await;
        task(&repo, "top", vec![mid.id]).await;

        let stats = service.graph_stats().await.unwrap();
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.roots, 1);
        assert_eq!(stats.leaves, 1);
        assert_eq!(stats.max_depth, 2);
    }
}
