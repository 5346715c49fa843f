//! Single or filtered work item retrieval

use async_trait::async_trait;
use serde_json::{Value, json};

use jive_domain::error::Result;
use jive_domain::value_objects::{ListQuery, SortOrder};

use super::{JiveTool, ToolContext, arg_enum, arg_filters, arg_str, arg_usize};

/// `jive_get_work_item`: fetch one item by flexible identifier, or a
/// filtered page.
pub struct GetWorkItemTool;

#[async_trait]
impl JiveTool for GetWorkItemTool {
    fn name(&self) -> &'static str {
        "jive_get_work_item"
    }

    fn description(&self) -> &'static str {
        "Jive: Retrieve a single work item by UUID, exact title, or keywords, \
         or list work items with filters and pagination"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "work_item_id": {
                    "type": "string",
                    "description": "UUID, exact title, or keywords; omit to list"
                },
                "filters": {
                    "type": "object",
                    "description": "Field filters; scalar means equals, list means any-of"
                },
                "limit": { "type": "integer", "minimum": 1, "maximum": 500 },
                "offset": { "type": "integer", "minimum": 0 },
                "sort_by": { "type": "string" },
                "sort_order": { "type": "string", "enum": ["ascending", "descending"] }
            }
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        if let Some(reference) = arg_str(&args, "work_item_id") {
            let id = ctx.app.resolver.resolve_required(&reference).await?;
            let item = ctx
                .app
                .work_items
                .get(id)
                .await?
                .ok_or_else(|| jive_domain::Error::not_found(reference))?;
            return Ok(json!({ "work_item": item }));
        }

        let query = ListQuery {
            filters: arg_filters(&args)?,
            limit: Some(arg_usize(&args, "limit", 100)),
            offset: Some(arg_usize(&args, "offset", 0)),
            sort_by: arg_str(&args, "sort_by"),
            sort_order: arg_enum::<SortOrder>(&args, "sort_order", "ascending | descending")?,
        };
        let items = ctx.app.work_items.list(query).await?;
        let count = items.len();
        Ok(json!({
            "work_items": items,
            "count": count,
        }))
    }
}
