//! Hierarchy and dependency traversal

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use jive_application::use_cases::dependency::ValidationOptions;
use jive_domain::entities::WorkItem;
use jive_domain::error::Result;

use super::{JiveTool, ToolContext, arg_bool, arg_str_list, required_str};

/// Depth cap shared with the hierarchy walks.
const MAX_TREE_DEPTH: usize = 32;

/// `jive_get_hierarchy`: children / ancestors / full tree, plus the
/// dependency queries and graph validation.
pub struct GetHierarchyTool;

#[async_trait]
impl JiveTool for GetHierarchyTool {
    fn name(&self) -> &'static str {
        "jive_get_hierarchy"
    }

    fn description(&self) -> &'static str {
        "Jive: Traverse work item relationships - children, ancestors, full hierarchy, \
         dependencies, and dependency graph validation"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "work_item_id": {
                    "type": "string",
                    "description": "Flexible identifier; required except for validate_dependencies"
                },
                "relationship": {
                    "type": "string",
                    "enum": ["children", "ancestors", "full_hierarchy", "dependencies", "validate_dependencies"]
                },
                "recursive": { "type": "boolean", "description": "Expand the whole subtree (children)" },
                "transitive": { "type": "boolean", "description": "Expand transitively (dependencies)" },
                "only_blocking": { "type": "boolean", "description": "Only dependencies not yet completed" },
                "work_item_ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Scope for validate_dependencies (default: whole graph)"
                },
                "check_circular": { "type": "boolean" },
                "check_missing": { "type": "boolean" },
                "suggest_fixes": { "type": "boolean" },
                "include_stats": { "type": "boolean" }
            },
            "required": ["relationship"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let relationship = required_str(&args, "relationship")?;
        match relationship.as_str() {
            "children" => {
                let id = resolve(ctx, &args).await?;
                let recursive = arg_bool(&args, "recursive", false);
                let children = ctx.app.hierarchy.get_children(id, recursive).await?;
                let count = children.len();
                Ok(json!({ "work_item_id": id, "children": children, "count": count }))
            }
            "ancestors" => {
                let id = resolve(ctx, &args).await?;
                let ancestors = ctx.app.hierarchy.get_ancestors(id).await?;
                let count = ancestors.len();
                Ok(json!({ "work_item_id": id, "ancestors": ancestors, "count": count }))
            }
            "full_hierarchy" => {
                let id = resolve(ctx, &args).await?;
                let root = ctx
                    .app
                    .work_items
                    .get(id)
                    .await?
                    .ok_or_else(|| jive_domain::Error::not_found(id.to_string()))?;
                let all = ctx.app.work_items.list_all().await?;
                Ok(json!({ "hierarchy": build_tree(&root, &all) }))
            }
            "dependencies" => {
                let id = resolve(ctx, &args).await?;
                let transitive = arg_bool(&args, "transitive", false);
                let only_blocking = arg_bool(&args, "only_blocking", false);
                let dependencies = ctx
                    .app
                    .dependency
                    .get_dependencies(id, transitive, only_blocking)
                    .await?;
                let count = dependencies.len();
                Ok(json!({
                    "work_item_id": id,
                    "dependencies": dependencies,
                    "count": count,
                    "transitive": transitive,
                    "only_blocking": only_blocking,
                }))
            }
            "validate_dependencies" => {
                let scope = match arg_str_list(&args, "work_item_ids") {
                    Some(references) => {
                        let mut ids = Vec::with_capacity(references.len());
                        for reference in &references {
                            ids.push(ctx.app.resolver.resolve_required(reference).await?);
                        }
                        Some(ids)
                    }
                    None => None,
                };
                let validation = ctx
                    .app
                    .dependency
                    .validate(ValidationOptions {
                        scope,
                        check_circular: arg_bool(&args, "check_circular", true),
                        check_missing: arg_bool(&args, "check_missing", true),
                        suggest_fixes: arg_bool(&args, "suggest_fixes", false),
                    })
                    .await?;
                let mut data = serde_json::to_value(&validation)?;
                if arg_bool(&args, "include_stats", false) {
                    data["stats"] = serde_json::to_value(ctx.app.dependency.graph_stats().await?)?;
                }
                Ok(data)
            }
            other => Err(jive_domain::Error::validation_field(
                format!("Invalid relationship: {other}"),
                "relationship",
                Some(Value::String(other.to_owned())),
                Some(
                    "children | ancestors | full_hierarchy | dependencies | validate_dependencies"
                        .to_owned(),
                ),
            )),
        }
    }
}

async fn resolve(ctx: &ToolContext, args: &Value) -> Result<Uuid> {
    let reference = required_str(args, "work_item_id")?;
    ctx.app.resolver.resolve_required(&reference).await
}

/// Assemble the nested tree from the flat item list, depth-capped.
fn build_tree(root: &WorkItem, all: &[WorkItem]) -> Value {
    let mut children_of: HashMap<Uuid, Vec<&WorkItem>> = HashMap::new();
    for item in all {
        if let Some(parent_id) = item.parent_id {
            children_of.entry(parent_id).or_default().push(item);
        }
    }
    for children in children_of.values_mut() {
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }

    fn node(
        item: &WorkItem,
        children_of: &HashMap<Uuid, Vec<&WorkItem>>,
        depth: usize,
    ) -> Value {
        let children: Vec<Value> = if depth >= MAX_TREE_DEPTH {
            Vec::new()
        } else {
            children_of
                .get(&item.id)
                .map(|kids| {
                    kids.iter()
                        .map(|kid| node(kid, children_of, depth + 1))
                        .collect()
                })
                .unwrap_or_default()
        };
        json!({
            "id": item.id,
            "type": item.item_type,
            "title": item.title,
            "status": item.status,
            "progress_percentage": item.progress_percentage,
            "children": children,
        })
    }

    node(root, &children_of, 0)
}
