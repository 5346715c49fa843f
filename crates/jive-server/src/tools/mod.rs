//! The consolidated tool surface
//!
//! Eight tools subsume the legacy names. Each declares a JSON Schema for
//! its arguments (validated by the dispatcher before the handler runs) and
//! returns its `data` payload; the dispatcher owns the envelope.

mod execute_work_item;
mod get_hierarchy;
mod get_work_item;
mod manage_work_item;
mod memory;
mod search_content;
mod sync_data;
mod track_progress;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use jive_domain::error::{Error, Result};
use jive_infrastructure::AppContext;

/// Per-call context handed to every handler.
pub struct ToolContext {
    /// The shared application context
    pub app: Arc<AppContext>,
    /// Cooperative cancellation handle; fires on deadline or peer cancel
    pub cancel: CancellationToken,
}

/// One MCP tool.
#[async_trait]
pub trait JiveTool: Send + Sync {
    /// Tool name (e.g. "`jive_manage_work_item`")
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for the arguments object
    fn input_schema(&self) -> Value;

    /// Execute the tool, returning the `data` payload.
    async fn execute(&self, ctx: &ToolContext, args: Value) -> Result<Value>;
}

/// Every consolidated tool, for registry construction.
#[must_use]
pub fn all_tools() -> Vec<Box<dyn JiveTool>> {
    vec![
        Box::new(manage_work_item::ManageWorkItemTool),
        Box::new(get_work_item::GetWorkItemTool),
        Box::new(search_content::SearchContentTool),
        Box::new(get_hierarchy::GetHierarchyTool),
        Box::new(execute_work_item::ExecuteWorkItemTool),
        Box::new(track_progress::TrackProgressTool),
        Box::new(sync_data::SyncDataTool),
        Box::new(memory::MemoryTool),
    ]
}

// ---------------------------------------------------------------------------
// Argument extraction helpers
// ---------------------------------------------------------------------------

pub(crate) fn arg_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

pub(crate) fn required_str(args: &Value, key: &str) -> Result<String> {
    arg_str(args, key).ok_or_else(|| {
        Error::validation_field(
            format!("Missing required argument '{key}'"),
            key,
            args.get(key).cloned(),
            Some("non-empty string".to_owned()),
        )
    })
}

pub(crate) fn arg_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn arg_f64(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

pub(crate) fn arg_usize(args: &Value, key: &str, default: usize) -> usize {
    args.get(key)
        .and_then(Value::as_u64)
        .map_or(default, |v| v as usize)
}

pub(crate) fn arg_str_list(args: &Value, key: &str) -> Option<Vec<String>> {
    args.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect()
    })
}

/// Parse an optional enum-valued argument, naming the field on failure.
pub(crate) fn arg_enum<T: FromStr>(args: &Value, key: &str, expected: &str) -> Result<Option<T>> {
    match arg_str(args, key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            Error::validation_field(
                format!("Invalid value '{raw}' for '{key}'"),
                key,
                Some(Value::String(raw.clone())),
                Some(expected.to_owned()),
            )
        }),
    }
}

/// Parse the `filters` argument into the engine's filter map.
pub(crate) fn arg_filters(args: &Value) -> Result<jive_domain::value_objects::Filters> {
    match args.get("filters") {
        None | Some(Value::Null) => Ok(jive_domain::value_objects::Filters::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            Error::validation_field(
                format!("Invalid filters object: {e}"),
                "filters",
                Some(value.clone()),
                Some("{field: value | [values]}".to_owned()),
            )
        }),
    }
}
