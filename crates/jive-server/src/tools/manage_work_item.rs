//! Unified work item CRUD

use serde_json::{Value, json};
use uuid::Uuid;

use jive_application::ProgressUpdate;
use jive_domain::entities::{Complexity, Priority, WorkItem, WorkItemStatus, WorkItemType};
use jive_domain::error::{Error, Result};
use jive_domain::utils::time;

use super::{
    JiveTool, ToolContext, arg_bool, arg_enum, arg_f64, arg_str, arg_str_list, required_str,
};
use async_trait::async_trait;

/// `jive_manage_work_item`: create / update / delete.
pub struct ManageWorkItemTool;

#[async_trait]
impl JiveTool for ManageWorkItemTool {
    fn name(&self) -> &'static str {
        "jive_manage_work_item"
    }

    fn description(&self) -> &'static str {
        "Jive: Unified work item management - create, update, or delete work items \
         (initiatives, epics, features, stories, tasks)"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create", "update", "delete"],
                    "description": "Management action to perform"
                },
                "work_item_id": {
                    "type": "string",
                    "description": "Work item identifier - required for update/delete. UUID, exact title, or keywords"
                },
                "type": {
                    "type": "string",
                    "enum": ["initiative", "epic", "feature", "story", "task"],
                    "description": "Work item type - required for create"
                },
                "title": { "type": "string" },
                "description": { "type": "string" },
                "status": {
                    "type": "string",
                    "enum": ["not_started", "backlog", "in_progress", "blocked", "completed", "done", "cancelled"]
                },
                "priority": {
                    "type": "string",
                    "enum": ["low", "medium", "high", "critical"]
                },
                "parent_id": { "type": ["string", "null"] },
                "dependencies": { "type": "array", "items": { "type": "string" } },
                "acceptance_criteria": { "type": "array", "items": { "type": "string" } },
                "tags": { "type": "array", "items": { "type": "string" } },
                "context_tags": { "type": "array", "items": { "type": "string" } },
                "complexity": { "type": "string", "enum": ["simple", "moderate", "complex"] },
                "effort_estimate": { "type": "number", "minimum": 0 },
                "actual_hours": { "type": "number", "minimum": 0 },
                "assignee": { "type": "string" },
                "reporter": { "type": "string" },
                "metadata": { "type": "object" },
                "progress": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": 100,
                    "description": "Explicit progress percentage (update action)"
                },
                "propagate": {
                    "type": "boolean",
                    "description": "Propagate progress to ancestors after a status/progress change"
                },
                "delete_children": {
                    "type": "boolean",
                    "description": "Whether to delete child work items (delete action)"
                }
            },
            "required": ["action"],
            "allOf": [
                {
                    "if": { "properties": { "action": { "const": "create" } } },
                    "then": { "required": ["type", "title"] }
                },
                {
                    "if": { "properties": { "action": { "enum": ["update", "delete"] } } },
                    "then": { "required": ["work_item_id"] }
                }
            ]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let action = required_str(&args, "action")?;
        let result = match action.as_str() {
            "create" => create(ctx, &args).await,
            "update" => update(ctx, &args).await,
            "delete" => delete(ctx, &args).await,
            other => Err(Error::validation_field(
                format!("Invalid action: {other}"),
                "action",
                Some(Value::String(other.to_owned())),
                Some("create | update | delete".to_owned()),
            )),
        };
        // Any mutation invalidates cached identifier resolutions
        if result.is_ok() {
            ctx.app.resolver.invalidate();
        }
        result
    }
}

async fn create(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let item_type: WorkItemType = arg_enum(args, "type", "initiative | epic | feature | story | task")?
        .ok_or_else(|| Error::validation_field("Missing required argument 'type'", "type", None, None))?;
    let title = required_str(args, "title")?;

    let parent_id = match arg_str(args, "parent_id") {
        Some(reference) => Some(ctx.app.resolver.resolve_required(&reference).await?),
        None => None,
    };
    ctx.app
        .hierarchy
        .validate_hierarchy(item_type, parent_id)
        .await?;

    let mut item = WorkItem::new(item_type, title, time::now());
    item.parent_id = parent_id;
    apply_fields(ctx, &mut item, args).await?;

    if let Some(status) = arg_enum::<WorkItemStatus>(args, "status", "a work item status")? {
        item.status = status;
        item.progress_percentage = status.leaf_progress();
        if status.is_terminal() {
            item.completed_at = Some(time::now());
        }
    }

    item.validate()?;
    let created = ctx.app.work_items.create(item).await?;
    Ok(json!({
        "work_item": created,
        "work_item_id": created.id,
    }))
}

async fn update(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let reference = required_str(args, "work_item_id")?;
    let id = ctx.app.resolver.resolve_required(&reference).await?;
    let mut item = ctx
        .app
        .work_items
        .get(id)
        .await?
        .ok_or_else(|| Error::not_found(reference))?;

    if let Some(title) = arg_str(args, "title") {
        item.title = title;
    }
    if let Some(new_parent) = args.get("parent_id") {
        let parent_id = match new_parent {
            Value::Null => None,
            Value::String(reference) if !reference.trim().is_empty() => {
                Some(ctx.app.resolver.resolve_required(reference).await?)
            }
            _ => item.parent_id,
        };
        if parent_id != item.parent_id {
            ctx.app
                .hierarchy
                .validate_hierarchy(item.item_type, parent_id)
                .await?;
            item.parent_id = parent_id;
        }
    }
    apply_fields(ctx, &mut item, args).await?;
    item.validate()?;
    let item = ctx.app.work_items.update(item).await?;

    // Status changes flow through the progress calculator so duality and
    // propagation stay consistent
    let status = arg_enum::<WorkItemStatus>(args, "status", "a work item status")?;
    let progress = arg_f64(args, "progress");
    let item = if status.is_some() || progress.is_some() {
        let report = ctx
            .app
            .progress
            .update(
                item.id,
                ProgressUpdate {
                    progress,
                    status,
                    propagate: arg_bool(args, "propagate", true),
                },
            )
            .await?;
        report.work_item
    } else {
        item
    };

    Ok(json!({
        "work_item": item,
        "work_item_id": item.id,
    }))
}

async fn delete(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let reference = required_str(args, "work_item_id")?;
    let id = ctx.app.resolver.resolve_required(&reference).await?;
    let delete_children = arg_bool(args, "delete_children", false);

    let children = ctx.app.hierarchy.get_children(id, true).await?;
    if !children.is_empty() && !delete_children {
        return Err(Error::validation_field(
            format!(
                "Work item has {} descendant(s); pass delete_children=true to cascade",
                children.len()
            ),
            "delete_children",
            Some(Value::Bool(false)),
            Some("true to cascade the delete".to_owned()),
        ));
    }

    let mut deleted_children = 0usize;
    for child in &children {
        if ctx.app.work_items.delete(child.id).await? {
            deleted_children += 1;
        }
    }
    let deleted = ctx.app.work_items.delete(id).await?;
    if !deleted {
        return Err(Error::not_found(id.to_string()));
    }

    Ok(json!({
        "work_item_id": id,
        "deleted": true,
        "deleted_children": deleted_children,
    }))
}

/// Shared scalar/list field application for create and update.
async fn apply_fields(ctx: &ToolContext, item: &mut WorkItem, args: &Value) -> Result<()> {
    if let Some(description) = args.get("description").and_then(Value::as_str) {
        item.description = description.to_owned();
    }
    if let Some(priority) = arg_enum::<Priority>(args, "priority", "low | medium | high | critical")? {
        item.priority = priority;
    }
    if let Some(complexity) =
        arg_enum::<Complexity>(args, "complexity", "simple | moderate | complex")?
    {
        item.complexity = Some(complexity);
    }
    if let Some(criteria) = arg_str_list(args, "acceptance_criteria") {
        item.acceptance_criteria = criteria;
    }
    if let Some(tags) = arg_str_list(args, "tags") {
        item.tags = tags;
    }
    if let Some(context_tags) = arg_str_list(args, "context_tags") {
        item.context_tags = context_tags;
    }
    if let Some(effort) = arg_f64(args, "effort_estimate") {
        item.effort_estimate = Some(effort);
    }
    if let Some(hours) = arg_f64(args, "actual_hours") {
        item.actual_hours = Some(hours);
    }
    if let Some(assignee) = arg_str(args, "assignee") {
        item.assignee = Some(assignee);
    }
    if let Some(reporter) = arg_str(args, "reporter") {
        item.reporter = Some(reporter);
    }
    if let Some(metadata) = args.get("metadata") {
        if metadata.is_object() {
            item.metadata = metadata.clone();
        }
    }
    if let Some(dependencies) = arg_str_list(args, "dependencies") {
        let mut resolved: Vec<Uuid> = Vec::with_capacity(dependencies.len());
        for dependency in &dependencies {
            resolved.push(ctx.app.resolver.resolve_required(dependency).await?);
        }
        if resolved.contains(&item.id) {
            return Err(Error::validation_field(
                "A work item cannot depend on itself",
                "dependencies",
                Some(Value::String(item.id.to_string())),
                None,
            ));
        }
        item.dependencies = resolved;
    }
    Ok(())
}
