//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for MCP Jive
///
/// Every variant maps onto one of the tool-surface `error_code` strings via
/// [`Error::error_code`]; handlers decide whether an error is retried
/// (storage availability only), surfaced, or escalated to `INTERNAL_ERROR`.
#[derive(Error, Debug)]
pub enum Error {
    /// Schema or invariant violation
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the violation
        message: String,
        /// The offending field, when known
        field: Option<String>,
        /// The value that was provided
        provided_value: Option<serde_json::Value>,
        /// What the field expected
        expected_format: Option<String>,
    },

    /// Unknown filter field passed to a list/search operation
    #[error("Invalid filter field: {field}")]
    InvalidFilter {
        /// The unknown field name
        field: String,
    },

    /// Lookup failed
    #[error("Not found: {identifier}")]
    NotFound {
        /// The identifier that failed to resolve
        identifier: String,
        /// Up to three candidate titles for error messages
        suggestions: Vec<String>,
    },

    /// Unique constraint violation (duplicate id or slug)
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting constraint
        message: String,
    },

    /// Parent/child type rule violation
    #[error("Invalid hierarchy: {message}")]
    InvalidHierarchy {
        /// Description of the rule that was violated
        message: String,
    },

    /// A dependency cycle was detected outside of a validation request
    #[error("Circular dependency: {message}")]
    CircularDependency {
        /// Description including the cycle witness
        message: String,
    },

    /// A dependency references a work item that does not exist
    #[error("Missing dependency: {message}")]
    MissingDependency {
        /// Description including the dangling id
        message: String,
    },

    /// Storage operation failed in a non-retryable way
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend unreachable; retried with backoff before surfacing
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Description of the availability problem
        message: String,
    },

    /// Embedding provider operation error
    #[error("Embedding provider error: {message}")]
    Embedding {
        /// Description of the embedding error
        message: String,
    },

    /// The call was cancelled by the peer or the dispatcher
    #[error("Operation cancelled")]
    Cancelled,

    /// The call exceeded its deadline
    #[error("Operation timed out after {seconds}s")]
    Timeout {
        /// The deadline that was exceeded, in seconds
        seconds: u64,
    },

    /// Dispatcher admission control rejected the call
    #[error("Too many requests: {message}")]
    TooManyRequests {
        /// Description of the backpressure condition
        message: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// I/O operation error
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing or serialization error
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl Error {
    /// Tool-surface error code for the response envelope.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } | Self::InvalidFilter { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidHierarchy { .. } => "INVALID_HIERARCHY",
            Self::CircularDependency { .. } => "CIRCULAR_DEPENDENCY",
            Self::MissingDependency { .. } => "MISSING_DEPENDENCY",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::StorageUnavailable { .. } => "STORAGE_UNAVAILABLE",
            Self::Embedding { .. } => "STORAGE_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            Self::Config { .. } | Self::Io { .. } | Self::Json { .. } | Self::Internal { .. } => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// True for error categories the storage retry policy may re-attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable { .. } | Self::Timeout { .. }
        )
    }
}

// Basic error creation methods
impl Error {
    /// Create a validation error with just a message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            provided_value: None,
            expected_format: None,
        }
    }

    /// Create a validation error for a specific field
    pub fn validation_field<S: Into<String>, F: Into<String>>(
        message: S,
        field: F,
        provided_value: Option<serde_json::Value>,
        expected_format: Option<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            provided_value,
            expected_format,
        }
    }

    /// Create a not found error without suggestions
    pub fn not_found<S: Into<String>>(identifier: S) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
            suggestions: Vec::new(),
        }
    }

    /// Create a not found error carrying resolver suggestions
    pub fn not_found_with_suggestions<S: Into<String>>(
        identifier: S,
        suggestions: Vec<String>,
    ) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
            suggestions,
        }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create an invalid hierarchy error
    pub fn invalid_hierarchy<S: Into<String>>(message: S) -> Self {
        Self::InvalidHierarchy {
            message: message.into(),
        }
    }

    /// Create a circular dependency error
    pub fn circular_dependency<S: Into<String>>(message: S) -> Self {
        Self::CircularDependency {
            message: message.into(),
        }
    }

    /// Create a missing dependency error
    pub fn missing_dependency<S: Into<String>>(message: S) -> Self {
        Self::MissingDependency {
            message: message.into(),
        }
    }
}

// Storage and infrastructure error creation methods
impl Error {
    /// Create a storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with source
    pub fn storage_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a storage unavailable error
    pub fn storage_unavailable<S: Into<String>>(message: S) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create an embedding provider error
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with source
    pub fn io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a too-many-requests error
    pub fn too_many_requests<S: Into<String>>(message: S) -> Self {
        Self::TooManyRequests {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_tool_surface() {
        assert_eq!(Error::validation("x").error_code(), "VALIDATION_ERROR");
        assert_eq!(Error::not_found("x").error_code(), "NOT_FOUND");
        assert_eq!(Error::conflict("x").error_code(), "CONFLICT");
        assert_eq!(
            Error::invalid_hierarchy("x").error_code(),
            "INVALID_HIERARCHY"
        );
        assert_eq!(
            Error::storage_unavailable("x").error_code(),
            "STORAGE_UNAVAILABLE"
        );
        assert_eq!(Error::Cancelled.error_code(), "CANCELLED");
        assert_eq!(Error::Timeout { seconds: 30 }.error_code(), "TIMEOUT");
        assert_eq!(Error::internal("x").error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn only_availability_errors_retry() {
        assert!(Error::storage_unavailable("down").is_retryable());
        assert!(Error::Timeout { seconds: 5 }.is_retryable());
        assert!(!Error::storage("corrupt").is_retryable());
        assert!(!Error::validation("bad").is_retryable());
    }
}
