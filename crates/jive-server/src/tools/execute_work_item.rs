//! Execution control

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use jive_application::StartOptions;
use jive_domain::entities::ExecutionMode;
use jive_domain::error::{Error, Result};

use super::{JiveTool, ToolContext, arg_bool, arg_enum, arg_f64, arg_str, required_str};

/// `jive_execute_work_item`: start / status / progress / completion /
/// cancellation of execution attempts.
pub struct ExecuteWorkItemTool;

#[async_trait]
impl JiveTool for ExecuteWorkItemTool {
    fn name(&self) -> &'static str {
        "jive_execute_work_item"
    }

    fn description(&self) -> &'static str {
        "Jive: Control work item execution - start an attempt, poll status, report \
         progress, finish, or cancel"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["start", "status", "update_progress", "complete", "fail", "cancel", "list"]
                },
                "work_item_id": {
                    "type": "string",
                    "description": "Flexible identifier - required for start"
                },
                "execution_id": {
                    "type": "string",
                    "description": "Execution UUID - required for status/update_progress/complete/fail/cancel"
                },
                "execution_mode": {
                    "type": "string",
                    "enum": ["sequential", "parallel", "dependency_based"]
                },
                "agent_context": { "type": "object" },
                "validate_dependencies": { "type": "boolean" },
                "progress": { "type": "number", "minimum": 0, "maximum": 100 },
                "error_message": { "type": "string" },
                "reason": { "type": "string" },
                "force": { "type": "boolean" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let action = required_str(&args, "action")?;
        match action.as_str() {
            "start" => {
                let reference = required_str(&args, "work_item_id")?;
                let id = ctx.app.resolver.resolve_required(&reference).await?;
                let mode = arg_enum::<ExecutionMode>(
                    &args,
                    "execution_mode",
                    "sequential | parallel | dependency_based",
                )?
                .unwrap_or(ExecutionMode::DependencyBased);
                let agent_context = args
                    .get("agent_context")
                    .filter(|v| v.is_object())
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                let record = ctx
                    .app
                    .execution
                    .start(
                        id,
                        StartOptions {
                            mode,
                            agent_context,
                            validate_dependencies: arg_bool(&args, "validate_dependencies", true),
                        },
                    )
                    .await?;
                Ok(json!({
                    "execution_id": record.execution_id,
                    "execution": record,
                }))
            }
            "status" => {
                let record = ctx.app.execution.status(execution_id(&args)?)?;
                Ok(json!({ "execution": record }))
            }
            "update_progress" => {
                let progress = arg_f64(&args, "progress").ok_or_else(|| {
                    Error::validation_field(
                        "Missing required argument 'progress'",
                        "progress",
                        None,
                        Some("number in [0, 100]".to_owned()),
                    )
                })?;
                let record = ctx
                    .app
                    .execution
                    .update_progress(execution_id(&args)?, progress)
                    .await?;
                Ok(json!({ "execution": record }))
            }
            "complete" => {
                let record = ctx
                    .app
                    .execution
                    .finish(execution_id(&args)?, true, None)
                    .await?;
                Ok(json!({ "execution": record }))
            }
            "fail" => {
                let record = ctx
                    .app
                    .execution
                    .finish(
                        execution_id(&args)?,
                        false,
                        arg_str(&args, "error_message"),
                    )
                    .await?;
                Ok(json!({ "execution": record }))
            }
            "cancel" => {
                let reason =
                    arg_str(&args, "reason").unwrap_or_else(|| "Cancelled by request".to_owned());
                let record = ctx
                    .app
                    .execution
                    .cancel(
                        execution_id(&args)?,
                        &reason,
                        arg_bool(&args, "force", false),
                    )
                    .await?;
                Ok(json!({ "execution": record }))
            }
            "list" => {
                let records = ctx.app.execution.list();
                let count = records.len();
                Ok(json!({ "executions": records, "count": count }))
            }
            other => Err(Error::validation_field(
                format!("Invalid action: {other}"),
                "action",
                Some(Value::String(other.to_owned())),
                Some("start | status | update_progress | complete | fail | cancel | list".to_owned()),
            )),
        }
    }
}

fn execution_id(args: &Value) -> Result<Uuid> {
    let raw = required_str(args, "execution_id")?;
    raw.parse::<Uuid>().map_err(|_| {
        Error::validation_field(
            format!("'{raw}' is not a valid execution UUID"),
            "execution_id",
            Some(Value::String(raw.clone())),
            Some("UUID".to_owned()),
        )
    })
}
