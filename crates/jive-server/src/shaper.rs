//! Response shaping under a byte budget
//!
//! Deterministic truncation of oversized responses: long description-like
//! fields first, then long arrays, then a denylist of non-essential fields.
//! Essential fields always survive.

use serde_json::Value;

/// Default byte budget.
pub const DEFAULT_MAX_BYTES: usize = 50_000;
/// Shaping starts above this serialized size.
pub const DEFAULT_THRESHOLD_BYTES: usize = 45_000;
/// Truncated description length.
const DESCRIPTION_LIMIT: usize = 1_000;
/// Arrays longer than this are capped.
const ARRAY_LIMIT: usize = 10;

/// Fields truncated like descriptions.
const TEXT_FIELDS: &[&str] = &["description", "notes", "details"];
/// Fields dropped when the response is still over budget.
const DENYLIST: &[&str] = &[
    "metadata",
    "debug_info",
    "raw_data",
    "logs",
    "history",
    "extended_info",
];
/// Fields that always survive shaping.
const ALLOWLIST: &[&str] = &[
    "id", "title", "status", "type", "success", "error", "message",
];

/// Shaper configuration.
#[derive(Debug, Clone, Copy)]
pub struct ShaperConfig {
    /// Hard byte budget
    pub max_bytes: usize,
    /// Shaping threshold
    pub threshold_bytes: usize,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
        }
    }
}

impl ShaperConfig {
    /// Config for an explicit budget, threshold at 90 %.
    #[must_use]
    pub fn with_budget(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            threshold_bytes: max_bytes.saturating_mul(9) / 10,
        }
    }
}

/// Shape a response under the byte budget.
///
/// Small responses pass through untouched. Oversized ones are rewritten in
/// stages; each stage re-measures before applying the next.
#[must_use]
pub fn shape_response(response: Value, config: ShaperConfig) -> Value {
    let size = serialized_size(&response);
    if size <= config.threshold_bytes {
        return response;
    }
    tracing::debug!(size, budget = config.max_bytes, "shaping oversized response");

    let mut shaped = response;
    truncate_text_fields(&mut shaped);
    truncate_arrays(&mut shaped);

    if serialized_size(&shaped) > config.max_bytes {
        drop_denylisted(&mut shaped);
    }
    shaped
}

fn serialized_size(value: &Value) -> usize {
    serde_json::to_string(value).map_or(0, |s| s.len())
}

fn truncate_text_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if TEXT_FIELDS.contains(&key.as_str()) {
                    if let Value::String(text) = entry {
                        if text.chars().count() > DESCRIPTION_LIMIT {
                            let original = text.chars().count();
                            let truncated: String = text.chars().take(DESCRIPTION_LIMIT).collect();
                            *entry = Value::String(format!(
                                "{truncated}... [TRUNCATED - Original length: {original} chars]"
                            ));
                            continue;
                        }
                    }
                }
                truncate_text_fields(entry);
            }
        }
        Value::Array(items) => {
            for item in items {
                truncate_text_fields(item);
            }
        }
        _ => {}
    }
}

fn truncate_arrays(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for entry in map.values_mut() {
                truncate_arrays(entry);
            }
        }
        Value::Array(items) => {
            if items.len() > ARRAY_LIMIT {
                let omitted = items.len() - ARRAY_LIMIT;
                items.truncate(ARRAY_LIMIT);
                items.push(serde_json::json!({
                    "_truncated": format!("... and {omitted} more items")
                }));
            }
            for item in items {
                truncate_arrays(item);
            }
        }
        _ => {}
    }
}

fn drop_denylisted(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| {
                ALLOWLIST.contains(&key.as_str()) || !DENYLIST.contains(&key.as_str())
            });
            for entry in map.values_mut() {
                drop_denylisted(entry);
            }
        }
        Value::Array(items) => {
            for item in items {
                drop_denylisted(item);
            }
        }
        _ => {}
    }
}
