//! Unified content search

use async_trait::async_trait;
use serde_json::{Value, json};

use jive_application::SearchScope;
use jive_domain::error::Result;
use jive_domain::value_objects::SearchMode;

use super::{JiveTool, ToolContext, arg_enum, arg_filters, arg_usize, required_str};

/// `jive_search_content`: semantic / keyword / hybrid search across work
/// items and memory.
pub struct SearchContentTool;

#[async_trait]
impl JiveTool for SearchContentTool {
    fn name(&self) -> &'static str {
        "jive_search_content"
    }

    fn description(&self) -> &'static str {
        "Jive: Search work items and memory with semantic, keyword, or hybrid matching"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "minLength": 1 },
                "search_type": {
                    "type": "string",
                    "enum": ["semantic", "vector", "keyword", "hybrid"],
                    "description": "Matching mode (default hybrid)"
                },
                "scope": {
                    "type": "string",
                    "enum": ["work_items", "architecture", "troubleshoot", "all"],
                    "description": "What to search (default work_items)"
                },
                "filters": { "type": "object" },
                "limit": { "type": "integer", "minimum": 1, "maximum": 100 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let query = required_str(&args, "query")?;
        let mode = arg_enum::<SearchMode>(&args, "search_type", "semantic | keyword | hybrid")?
            .unwrap_or(SearchMode::Hybrid);
        let scope = arg_enum::<SearchScope>(
            &args,
            "scope",
            "work_items | architecture | troubleshoot | all",
        )?
        .unwrap_or(SearchScope::WorkItems);
        let limit = arg_usize(&args, "limit", 10).min(100);

        let hits = ctx
            .app
            .search
            .search(&query, mode, scope, arg_filters(&args)?, limit)
            .await?;
        let count = hits.len();
        Ok(json!({
            "results": hits,
            "count": count,
            "query": query,
            "search_type": mode.to_string(),
            "scope": scope.to_string(),
        }))
    }
}
