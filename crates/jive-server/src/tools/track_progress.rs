//! Progress reads and writes

use async_trait::async_trait;
use serde_json::{Value, json};

use jive_application::ProgressUpdate;
use jive_domain::entities::WorkItemStatus;
use jive_domain::error::{Error, Result};

use super::{JiveTool, ToolContext, arg_bool, arg_enum, arg_f64, arg_str, required_str};

/// `jive_track_progress`: update, recalculate, and report progress.
pub struct TrackProgressTool;

#[async_trait]
impl JiveTool for TrackProgressTool {
    fn name(&self) -> &'static str {
        "jive_track_progress"
    }

    fn description(&self) -> &'static str {
        "Jive: Track work item progress - apply updates with propagation, recalculate \
         a subtree, or fetch an aggregate report"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["track", "recalculate", "get_report"]
                },
                "work_item_id": {
                    "type": "string",
                    "description": "Flexible identifier - required for track; optional root for recalculate"
                },
                "progress": { "type": "number", "minimum": 0, "maximum": 100 },
                "status": {
                    "type": "string",
                    "enum": ["not_started", "backlog", "in_progress", "blocked", "completed", "done", "cancelled"]
                },
                "propagate": { "type": "boolean", "description": "Walk ancestors after the write (default true)" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let action = required_str(&args, "action")?;
        match action.as_str() {
            "track" => {
                let reference = required_str(&args, "work_item_id")?;
                let id = ctx.app.resolver.resolve_required(&reference).await?;
                let report = ctx
                    .app
                    .progress
                    .update(
                        id,
                        ProgressUpdate {
                            progress: arg_f64(&args, "progress"),
                            status: arg_enum::<WorkItemStatus>(
                                &args,
                                "status",
                                "a work item status",
                            )?,
                            propagate: arg_bool(&args, "propagate", true),
                        },
                    )
                    .await?;
                ctx.app.resolver.invalidate();
                Ok(serde_json::to_value(&report)?)
            }
            "recalculate" => {
                let root = match arg_str(&args, "work_item_id") {
                    Some(reference) => Some(ctx.app.resolver.resolve_required(&reference).await?),
                    None => None,
                };
                let report = ctx.app.progress.recalculate(root).await?;
                Ok(serde_json::to_value(&report)?)
            }
            "get_report" => {
                let report = ctx.app.progress.report().await?;
                Ok(json!({ "report": report }))
            }
            other => Err(Error::validation_field(
                format!("Invalid action: {other}"),
                "action",
                Some(Value::String(other.to_owned())),
                Some("track | recalculate | get_report".to_owned()),
            )),
        }
    }
}
