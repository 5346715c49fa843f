//! The standard response envelope
//!
//! Every tool call returns one JSON object: `{success: true, data,
//! message?, metadata?}` or `{success: false, error, error_code, details?,
//! timestamp}`. Domain errors map onto their envelope fields here, in one
//! place.

use serde_json::{Value, json};

use jive_domain::Error;
use jive_domain::utils::time;

/// Build a success envelope.
#[must_use]
pub fn success(data: Value, message: Option<&str>) -> Value {
    let mut envelope = json!({
        "success": true,
        "data": data,
    });
    if let Some(message) = message {
        envelope["message"] = Value::String(message.to_owned());
    }
    envelope
}

/// Build a success envelope with extra metadata (deprecation notes etc.).
#[must_use]
pub fn success_with_metadata(data: Value, message: Option<&str>, metadata: Value) -> Value {
    let mut envelope = success(data, message);
    envelope["metadata"] = metadata;
    envelope
}

/// Build a failure envelope from a domain error.
#[must_use]
pub fn failure(error: &Error) -> Value {
    let mut envelope = json!({
        "success": false,
        "error": error.to_string(),
        "error_code": error.error_code(),
        "timestamp": time::to_rfc3339(time::now()),
    });
    if let Some(details) = error_details(error) {
        envelope["details"] = details;
    }
    envelope
}

/// Build a failure envelope from raw parts (dispatcher-level conditions
/// with no domain error behind them).
#[must_use]
pub fn failure_raw(error_code: &str, message: &str, details: Option<Value>) -> Value {
    let mut envelope = json!({
        "success": false,
        "error": message,
        "error_code": error_code,
        "timestamp": time::to_rfc3339(time::now()),
    });
    if let Some(details) = details {
        envelope["details"] = details;
    }
    envelope
}

/// Structured detail fields for error categories that carry them.
fn error_details(error: &Error) -> Option<Value> {
    match error {
        Error::Validation {
            field,
            provided_value,
            expected_format,
            ..
        } => {
            let mut details = serde_json::Map::new();
            if let Some(field) = field {
                details.insert("field".to_owned(), Value::String(field.clone()));
            }
            if let Some(value) = provided_value {
                details.insert("provided_value".to_owned(), value.clone());
            }
            if let Some(expected) = expected_format {
                details.insert(
                    "expected_format".to_owned(),
                    Value::String(expected.clone()),
                );
            }
            if details.is_empty() {
                None
            } else {
                Some(Value::Object(details))
            }
        }
        Error::InvalidFilter { field } => Some(json!({ "field": field })),
        Error::NotFound {
            identifier,
            suggestions,
        } => {
            let mut details = serde_json::Map::new();
            details.insert("identifier".to_owned(), Value::String(identifier.clone()));
            if !suggestions.is_empty() {
                details.insert("suggestions".to_owned(), json!(suggestions));
            }
            Some(Value::Object(details))
        }
        Error::StorageUnavailable { .. } => Some(json!({
            "fallback": "Retry later; the storage backend is unreachable after 3 backoff attempts"
        })),
        Error::Timeout { seconds } => Some(json!({ "deadline_secs": seconds })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_shape() {
        let env = success(json!({"id": "x"}), Some("created"));
        assert_eq!(env["success"], json!(true));
        assert_eq!(env["data"]["id"], json!("x"));
        assert_eq!(env["message"], json!("created"));
    }

    #[test]
    fn failure_carries_code_and_timestamp() {
        let env = failure(&Error::not_found_with_suggestions(
            "paymnt",
            vec!["Payment Integration".to_owned()],
        ));
        assert_eq!(env["success"], json!(false));
        assert_eq!(env["error_code"], json!("NOT_FOUND"));
        assert_eq!(env["details"]["identifier"], json!("paymnt"));
        assert_eq!(
            env["details"]["suggestions"],
            json!(["Payment Integration"])
        );
        let ts = env["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn validation_details_name_the_field() {
        let env = failure(&Error::validation_field(
            "bad status",
            "status",
            Some(json!("nope")),
            Some("one of the status names".to_owned()),
        ));
        assert_eq!(env["details"]["field"], json!("status"));
        assert_eq!(env["details"]["provided_value"], json!("nope"));
    }
}
