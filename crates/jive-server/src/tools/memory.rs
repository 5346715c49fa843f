//! Memory CRUD, retrieval, and matching

use async_trait::async_trait;
use serde_json::{Value, json};

use jive_application::use_cases::context::ContextRequest;
use jive_application::{MatchingContext, MemoryService};
use jive_domain::entities::MemoryNamespace;
use jive_domain::error::{Error, Result};
use jive_domain::value_objects::ListQuery;

use super::{
    JiveTool, ToolContext, arg_bool, arg_f64, arg_str, arg_str_list, arg_usize, required_str,
};

/// `jive_memory`: architecture and troubleshoot memory operations.
pub struct MemoryTool;

#[async_trait]
impl JiveTool for MemoryTool {
    fn name(&self) -> &'static str {
        "jive_memory"
    }

    fn description(&self) -> &'static str {
        "Jive: Institutional memory - create, update, retrieve, and search \
         architecture specs and troubleshooting solutions, assemble token-budgeted \
         context, and match problems to solutions"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "namespace": { "type": "string", "enum": ["architecture", "troubleshoot"] },
                "action": {
                    "type": "string",
                    "enum": ["create", "update", "get", "delete", "list", "search",
                             "get_context", "match_problem", "get_solution", "mark_outcome"]
                },
                "slug": { "type": "string" },
                "title": { "type": "string" },
                "ai_requirements": { "type": "string", "maxLength": 10000 },
                "ai_when_to_use": { "type": "array", "items": { "type": "string" }, "maxItems": 10 },
                "ai_use_case": { "type": "array", "items": { "type": "string" }, "maxItems": 10 },
                "ai_solutions": { "type": "string", "maxLength": 10000 },
                "keywords": { "type": "array", "items": { "type": "string" }, "maxItems": 20 },
                "children_slugs": { "type": "array", "items": { "type": "string" }, "maxItems": 50 },
                "related_slugs": { "type": "array", "items": { "type": "string" }, "maxItems": 20 },
                "linked_epic_ids": { "type": "array", "items": { "type": "string" }, "maxItems": 20 },
                "tags": { "type": "array", "items": { "type": "string" } },
                "metadata": { "type": "object" },
                "query": { "type": "string" },
                "limit": { "type": "integer", "minimum": 1, "maximum": 100 },
                "offset": { "type": "integer", "minimum": 0 },
                "max_tokens": { "type": "integer", "minimum": 100 },
                "problem": { "type": "string" },
                "max_results": { "type": "integer", "minimum": 1, "maximum": 50 },
                "min_relevance_score": { "type": "number", "minimum": 0, "maximum": 1 },
                "boost_by_success_rate": { "type": "boolean" },
                "mark_as_used": { "type": "boolean" },
                "worked": { "type": "boolean" }
            },
            "required": ["namespace", "action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let namespace = required_str(&args, "namespace")?
            .parse::<MemoryNamespace>()
            .map_err(|_| {
                Error::validation_field(
                    "Invalid namespace",
                    "namespace",
                    args.get("namespace").cloned(),
                    Some("architecture | troubleshoot".to_owned()),
                )
            })?;
        let action = required_str(&args, "action")?;

        match namespace {
            MemoryNamespace::Architecture => architecture_action(ctx, &action, &args).await,
            MemoryNamespace::Troubleshoot => troubleshoot_action(ctx, &action, &args).await,
        }
    }
}

async fn architecture_action(ctx: &ToolContext, action: &str, args: &Value) -> Result<Value> {
    let memory = &ctx.app.memory;
    match action {
        "create" => {
            let mut item = MemoryService::new_architecture_item(
                &required_str(args, "slug")?,
                &required_str(args, "title")?,
                &required_str(args, "ai_requirements")?,
            );
            apply_architecture_fields(&mut item, args);
            let created = memory.create_architecture(item).await?;
            Ok(json!({ "item": created }))
        }
        "update" => {
            let slug = required_str(args, "slug")?;
            let mut item = memory
                .get_architecture(&slug)
                .await?
                .ok_or_else(|| Error::not_found(slug))?;
            if let Some(title) = arg_str(args, "title") {
                item.title = title;
            }
            if let Some(requirements) = arg_str(args, "ai_requirements") {
                item.ai_requirements = requirements;
            }
            apply_architecture_fields(&mut item, args);
            let updated = memory.update_architecture(item).await?;
            Ok(json!({ "item": updated }))
        }
        "get" => {
            let slug = required_str(args, "slug")?;
            let item = memory
                .get_architecture(&slug)
                .await?
                .ok_or_else(|| Error::not_found(slug))?;
            Ok(json!({ "item": item }))
        }
        "delete" => {
            let slug = required_str(args, "slug")?;
            memory.delete_architecture(&slug).await?;
            Ok(json!({ "slug": slug, "deleted": true }))
        }
        "list" => {
            let items = memory.list_architecture(list_query(args)).await?;
            let count = items.len();
            Ok(json!({ "items": items, "count": count }))
        }
        "search" => {
            let query = required_str(args, "query")?;
            let hits = memory
                .search_architecture(&query, arg_usize(args, "limit", 10))
                .await?;
            let count = hits.len();
            Ok(json!({ "results": hits, "count": count }))
        }
        "get_context" => {
            let slug = required_str(args, "slug")?;
            let request = ContextRequest {
                slug,
                max_tokens: arg_usize(
                    args,
                    "max_tokens",
                    jive_application::use_cases::context::DEFAULT_TOKEN_BUDGET,
                ),
            };
            let context = ctx.app.context.get_context(request).await?;
            Ok(serde_json::to_value(&context)?)
        }
        other => Err(invalid_action(
            other,
            "create | update | get | delete | list | search | get_context",
        )),
    }
}

async fn troubleshoot_action(ctx: &ToolContext, action: &str, args: &Value) -> Result<Value> {
    let memory = &ctx.app.memory;
    match action {
        "create" => {
            let mut item = MemoryService::new_troubleshoot_item(
                &required_str(args, "slug")?,
                &required_str(args, "title")?,
                &required_str(args, "ai_solutions")?,
            );
            apply_troubleshoot_fields(&mut item, args);
            let created = memory.create_troubleshoot(item).await?;
            Ok(json!({ "item": created }))
        }
        "update" => {
            let slug = required_str(args, "slug")?;
            let mut item = memory
                .get_troubleshoot(&slug)
                .await?
                .ok_or_else(|| Error::not_found(slug))?;
            if let Some(title) = arg_str(args, "title") {
                item.title = title;
            }
            if let Some(solutions) = arg_str(args, "ai_solutions") {
                item.ai_solutions = solutions;
            }
            apply_troubleshoot_fields(&mut item, args);
            let updated = memory.update_troubleshoot(item).await?;
            Ok(json!({ "item": updated }))
        }
        "get" => {
            let slug = required_str(args, "slug")?;
            let item = memory
                .get_troubleshoot(&slug)
                .await?
                .ok_or_else(|| Error::not_found(slug))?;
            Ok(json!({ "item": item }))
        }
        "delete" => {
            let slug = required_str(args, "slug")?;
            memory.delete_troubleshoot(&slug).await?;
            Ok(json!({ "slug": slug, "deleted": true }))
        }
        "list" => {
            let items = memory.list_troubleshoot(list_query(args)).await?;
            let count = items.len();
            Ok(json!({ "items": items, "count": count }))
        }
        "search" => {
            let query = required_str(args, "query")?;
            let hits = memory
                .search_troubleshoot(&query, arg_usize(args, "limit", 10))
                .await?;
            let count = hits.len();
            Ok(json!({ "results": hits, "count": count }))
        }
        "match_problem" => {
            let problem = required_str(args, "problem")?;
            let defaults = MatchingContext::default();
            let matches = ctx
                .app
                .matcher
                .match_problem(
                    &problem,
                    &MatchingContext {
                        max_results: arg_usize(args, "max_results", defaults.max_results),
                        min_relevance_score: arg_f64(args, "min_relevance_score")
                            .unwrap_or(defaults.min_relevance_score),
                        boost_by_success_rate: arg_bool(
                            args,
                            "boost_by_success_rate",
                            defaults.boost_by_success_rate,
                        ),
                    },
                )
                .await?;
            let count = matches.len();
            Ok(json!({ "matches": matches, "count": count }))
        }
        "get_solution" => {
            let slug = required_str(args, "slug")?;
            let mark_as_used = arg_bool(args, "mark_as_used", true);
            let solution = ctx
                .app
                .matcher
                .get_detailed_solution(&slug, mark_as_used)
                .await?
                .ok_or_else(|| Error::not_found(slug))?;
            Ok(json!({ "solution": solution }))
        }
        "mark_outcome" => {
            let slug = required_str(args, "slug")?;
            let worked = args.get("worked").and_then(Value::as_bool).ok_or_else(|| {
                Error::validation_field(
                    "Missing required argument 'worked'",
                    "worked",
                    None,
                    Some("boolean".to_owned()),
                )
            })?;
            let solution = ctx.app.matcher.mark_solution_outcome(&slug, worked).await?;
            Ok(json!({ "solution": solution }))
        }
        other => Err(invalid_action(
            other,
            "create | update | get | delete | list | search | match_problem | get_solution | mark_outcome",
        )),
    }
}

fn apply_architecture_fields(item: &mut jive_domain::entities::ArchitectureItem, args: &Value) {
    if let Some(when) = arg_str_list(args, "ai_when_to_use") {
        item.ai_when_to_use = when;
    }
    if let Some(keywords) = arg_str_list(args, "keywords") {
        item.keywords = keywords;
    }
    if let Some(children) = arg_str_list(args, "children_slugs") {
        item.children_slugs = children;
    }
    if let Some(related) = arg_str_list(args, "related_slugs") {
        item.related_slugs = related;
    }
    if let Some(epics) = arg_str_list(args, "linked_epic_ids") {
        item.linked_epic_ids = epics;
    }
    if let Some(tags) = arg_str_list(args, "tags") {
        item.tags = tags;
    }
    if let Some(metadata) = args.get("metadata").filter(|v| v.is_object()) {
        item.metadata = metadata.clone();
    }
}

fn apply_troubleshoot_fields(item: &mut jive_domain::entities::TroubleshootItem, args: &Value) {
    if let Some(cases) = arg_str_list(args, "ai_use_case") {
        item.ai_use_case = cases;
    }
    if let Some(keywords) = arg_str_list(args, "keywords") {
        item.keywords = keywords;
    }
    if let Some(tags) = arg_str_list(args, "tags") {
        item.tags = tags;
    }
    if let Some(metadata) = args.get("metadata").filter(|v| v.is_object()) {
        item.metadata = metadata.clone();
    }
}

fn list_query(args: &Value) -> ListQuery {
    ListQuery {
        limit: Some(arg_usize(args, "limit", 100)),
        offset: Some(arg_usize(args, "offset", 0)),
        ..ListQuery::default()
    }
}

fn invalid_action(action: &str, expected: &str) -> Error {
    Error::validation_field(
        format!("Invalid action for this namespace: {action}"),
        "action",
        Some(Value::String(action.to_owned())),
        Some(expected.to_owned()),
    )
}
