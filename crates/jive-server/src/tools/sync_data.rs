//! Markdown export/import

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Value, json};

use jive_application::ImportMode;
use jive_domain::entities::MemoryNamespace;
use jive_domain::error::{Error, Result};

use super::{JiveTool, ToolContext, arg_enum, arg_str, required_str};

/// `jive_sync_data`: export / import / status for the memory namespaces.
pub struct SyncDataTool;

#[async_trait]
impl JiveTool for SyncDataTool {
    fn name(&self) -> &'static str {
        "jive_sync_data"
    }

    fn description(&self) -> &'static str {
        "Jive: Export memory items to markdown with YAML front matter, import them \
         back, or compare storage against the export directory"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["export", "import", "status"] },
                "namespace": {
                    "type": "string",
                    "enum": ["architecture", "troubleshoot", "all"],
                    "description": "Which namespace to sync (default all)"
                },
                "directory": {
                    "type": "string",
                    "description": "Target directory (default: configured exports dir)"
                },
                "mode": {
                    "type": "string",
                    "enum": ["create_only", "update_only", "create_or_update", "replace"],
                    "description": "Import merge mode (default create_or_update)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let action = required_str(&args, "action")?;
        let directory = arg_str(&args, "directory")
            .map_or_else(|| ctx.app.config.exports_dir.clone(), PathBuf::from);
        let namespaces = namespaces(&args)?;

        match action.as_str() {
            "export" => {
                let mut reports = Vec::new();
                for namespace in namespaces {
                    reports.push(ctx.app.sync.export_namespace(namespace, &directory).await?);
                }
                Ok(json!({ "reports": reports }))
            }
            "import" => {
                let mode = arg_enum::<ImportMode>(
                    &args,
                    "mode",
                    "create_only | update_only | create_or_update | replace",
                )?
                .unwrap_or(ImportMode::CreateOrUpdate);
                let mut reports = Vec::new();
                for namespace in namespaces {
                    let report = ctx
                        .app
                        .sync
                        .import_namespace(namespace, &directory, mode)
                        .await?;
                    reports.push(json!({
                        "namespace": namespace,
                        "report": report,
                    }));
                }
                Ok(json!({ "reports": reports, "mode": mode }))
            }
            "status" => {
                let status = ctx.app.sync.status(&directory).await?;
                Ok(serde_json::to_value(&status)?)
            }
            other => Err(Error::validation_field(
                format!("Invalid action: {other}"),
                "action",
                Some(Value::String(other.to_owned())),
                Some("export | import | status".to_owned()),
            )),
        }
    }
}

fn namespaces(args: &Value) -> Result<Vec<MemoryNamespace>> {
    match arg_str(args, "namespace").as_deref() {
        None | Some("all") => Ok(vec![
            MemoryNamespace::Architecture,
            MemoryNamespace::Troubleshoot,
        ]),
        Some(raw) => raw.parse::<MemoryNamespace>().map(|ns| vec![ns]).map_err(|_| {
            Error::validation_field(
                format!("Invalid namespace: {raw}"),
                "namespace",
                Some(Value::String(raw.to_owned())),
                Some("architecture | troubleshoot | all".to_owned()),
            )
        }),
    }
}
