//! Tool registry and dispatch pipeline
//!
//! Holds every consolidated tool with its compiled argument schema, plus
//! the legacy alias table. Dispatch runs: alias rewrite → schema
//! validation → admission control → handler under deadline and
//! cancellation → envelope → response shaper.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use jive_domain::error::{Error, Result};
use jive_infrastructure::AppContext;

use crate::envelope;
use crate::protocol::ToolDefinition;
use crate::shaper::{ShaperConfig, shape_response};
use crate::tools::{JiveTool, ToolContext, all_tools};

/// Rewrites a legacy argument shape into the consolidated one.
type ArgRewrite = fn(Value) -> Value;

struct LegacyAlias {
    target: &'static str,
    rewrite: ArgRewrite,
}

struct RegisteredTool {
    tool: Box<dyn JiveTool>,
    validator: jsonschema::Validator,
}

/// Outcome of a dispatch, for transports that track tool-level failure.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The shaped response envelope
    pub envelope: Value,
    /// False when the envelope reports a failure
    pub success: bool,
}

/// The tool registry and dispatcher.
pub struct ToolRegistry {
    tools: HashMap<&'static str, RegisteredTool>,
    legacy: HashMap<&'static str, LegacyAlias>,
    app: Arc<AppContext>,
    in_flight: Arc<Semaphore>,
    queued: AtomicUsize,
    max_queued: usize,
    deadline: Duration,
    shaper: ShaperConfig,
}

impl ToolRegistry {
    /// Build the registry with every consolidated tool registered.
    ///
    /// # Errors
    ///
    /// Internal errors when a tool declares an invalid JSON Schema.
    pub fn new(app: Arc<AppContext>) -> Result<Self> {
        let config = &app.config;
        let mut registry = Self {
            tools: HashMap::new(),
            legacy: legacy_aliases(),
            in_flight: Arc::new(Semaphore::new(config.max_in_flight)),
            queued: AtomicUsize::new(0),
            max_queued: config.max_queued,
            deadline: Duration::from_secs(config.tool_timeout_secs),
            shaper: ShaperConfig::with_budget(config.max_response_bytes),
            app,
        };
        for tool in all_tools() {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    fn register(&mut self, tool: Box<dyn JiveTool>) -> Result<()> {
        let schema = tool.input_schema();
        let validator = jsonschema::validator_for(&schema).map_err(|e| {
            Error::internal(format!("Tool '{}' has an invalid schema: {e}", tool.name()))
        })?;
        tracing::debug!(tool = tool.name(), "registering tool");
        self.tools
            .insert(tool.name(), RegisteredTool { tool, validator });
        Ok(())
    }

    /// Definitions for `tools/list`.
    ///
    /// In `full` tool mode the accepted legacy names are listed too, each
    /// described as an alias of its consolidated target.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|registered| ToolDefinition {
                name: registered.tool.name().to_owned(),
                description: registered.tool.description().to_owned(),
                input_schema: registered.tool.input_schema(),
            })
            .collect();
        if self.app.config.tool_mode == "full" && self.app.config.legacy_support {
            for (name, alias) in &self.legacy {
                if let Some(target) = self.tools.get(alias.target) {
                    definitions.push(ToolDefinition {
                        name: (*name).to_owned(),
                        description: format!(
                            "Deprecated alias of {}: {}",
                            alias.target,
                            target.tool.description()
                        ),
                        input_schema: target.tool.input_schema(),
                    });
                }
            }
        }
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Whether a tool (or accepted legacy alias) exists.
    #[must_use]
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
            || (self.app.config.legacy_support && self.legacy.contains_key(name))
    }

    /// Dispatch one tool call and return the shaped envelope.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> DispatchOutcome {
        let envelope = self.dispatch_inner(name, arguments).await;
        let success = envelope
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        DispatchOutcome {
            envelope: shape_response(envelope, self.shaper),
            success,
        }
    }

    async fn dispatch_inner(&self, name: &str, arguments: Value) -> Value {
        // Legacy alias rewrite
        let mut deprecation: Option<String> = None;
        let (name, arguments) = match self.legacy.get(name) {
            Some(alias) if self.app.config.legacy_support => {
                if self.app.config.deprecation_warnings {
                    deprecation = Some(format!(
                        "Tool '{name}' is deprecated; use '{}' instead",
                        alias.target
                    ));
                }
                tracing::debug!(legacy = name, target = alias.target, "legacy alias rewrite");
                (alias.target, (alias.rewrite)(arguments))
            }
            _ => match self.tools.get_key_value(name) {
                Some((key, _)) => (*key, arguments),
                None => {
                    return envelope::failure_raw(
                        "TOOL_NOT_FOUND",
                        &format!("Unknown tool: {name}"),
                        Some(json!({ "tool": name })),
                    );
                }
            },
        };

        let Some(registered) = self.tools.get(name) else {
            return envelope::failure_raw(
                "TOOL_NOT_FOUND",
                &format!("Unknown tool: {name}"),
                Some(json!({ "tool": name })),
            );
        };

        // Schema validation, reporting the offending field
        if let Some(validation_error) = registered.validator.iter_errors(&arguments).next() {
            let path = validation_error.instance_path().to_string();
            let field = path.trim_start_matches('/');
            let err = Error::validation_field(
                format!("Invalid arguments for '{name}': {validation_error}"),
                if field.is_empty() { "arguments" } else { field },
                None,
                None,
            );
            return envelope::failure(&err);
        }

        // Admission control: bounded in-flight calls, bounded queue
        let _permit = match self.in_flight.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                let waiting = self.queued.fetch_add(1, Ordering::SeqCst);
                if waiting >= self.max_queued {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    return envelope::failure(&Error::too_many_requests(format!(
                        "Dispatcher queue is full ({} waiting)",
                        waiting
                    )));
                }
                let permit = self.in_flight.acquire().await;
                self.queued.fetch_sub(1, Ordering::SeqCst);
                match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        return envelope::failure(&Error::internal(
                            "Dispatcher semaphore closed during shutdown",
                        ));
                    }
                }
            }
        };

        // Handler under deadline and cancellation
        let cancel = CancellationToken::new();
        let ctx = ToolContext {
            app: Arc::clone(&self.app),
            cancel: cancel.clone(),
        };

        let started = std::time::Instant::now();
        let result = tokio::time::timeout(self.deadline, registered.tool.execute(&ctx, arguments))
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let envelope = match result {
            Ok(Ok(data)) => {
                tracing::debug!(tool = name, elapsed_ms, "tool call succeeded");
                match deprecation {
                    Some(note) => envelope::success_with_metadata(
                        data,
                        None,
                        json!({ "deprecation": note }),
                    ),
                    None => envelope::success(data, None),
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(tool = name, elapsed_ms, error = %err, "tool call failed");
                envelope::failure(&err)
            }
            Err(_) => {
                cancel.cancel();
                tracing::warn!(tool = name, elapsed_ms, "tool call exceeded its deadline");
                envelope::failure(&Error::Timeout {
                    seconds: self.deadline.as_secs(),
                })
            }
        };
        envelope
    }
}

/// The legacy-to-consolidated mapping table.
fn legacy_aliases() -> HashMap<&'static str, LegacyAlias> {
    fn with_action(action: &'static str) -> impl Fn(Value) -> Value {
        move |mut args| {
            if let Value::Object(map) = &mut args {
                map.insert("action".to_owned(), Value::String(action.to_owned()));
            }
            args
        }
    }
    fn rename_task_id(mut args: Value) -> Value {
        if let Value::Object(map) = &mut args {
            if let Some(id) = map.remove("task_id") {
                map.insert("work_item_id".to_owned(), id);
            }
        }
        args
    }

    let mut table: HashMap<&'static str, LegacyAlias> = HashMap::new();
    table.insert(
        "jive_create_work_item",
        LegacyAlias {
            target: "jive_manage_work_item",
            rewrite: |args| with_action("create")(args),
        },
    );
    table.insert(
        "jive_update_work_item",
        LegacyAlias {
            target: "jive_manage_work_item",
            rewrite: |args| with_action("update")(args),
        },
    );
    table.insert(
        "jive_delete_task",
        LegacyAlias {
            target: "jive_manage_work_item",
            rewrite: |args| with_action("delete")(rename_task_id(args)),
        },
    );
    table.insert(
        "jive_get_task",
        LegacyAlias {
            target: "jive_get_work_item",
            rewrite: rename_task_id,
        },
    );
    table.insert(
        "jive_search_work_items",
        LegacyAlias {
            target: "jive_search_content",
            rewrite: |args| args,
        },
    );
    table.insert(
        "jive_get_work_item_children",
        LegacyAlias {
            target: "jive_get_hierarchy",
            rewrite: |mut args| {
                if let Value::Object(map) = &mut args {
                    map.insert(
                        "relationship".to_owned(),
                        Value::String("children".to_owned()),
                    );
                }
                args
            },
        },
    );
    table.insert(
        "jive_get_work_item_dependencies",
        LegacyAlias {
            target: "jive_get_hierarchy",
            rewrite: |mut args| {
                if let Value::Object(map) = &mut args {
                    map.insert(
                        "relationship".to_owned(),
                        Value::String("dependencies".to_owned()),
                    );
                }
                args
            },
        },
    );
    table.insert(
        "jive_validate_dependencies",
        LegacyAlias {
            target: "jive_get_hierarchy",
            rewrite: |mut args| {
                if let Value::Object(map) = &mut args {
                    map.insert(
                        "relationship".to_owned(),
                        Value::String("validate_dependencies".to_owned()),
                    );
                }
                args
            },
        },
    );
    table.insert(
        "jive_get_progress_report",
        LegacyAlias {
            target: "jive_track_progress",
            rewrite: |args| with_action("get_report")(args),
        },
    );
    table
}
