//! Spcht error types

use thiserror::Error;

/// Result type for Spcht operations
pub type SpchtResult<T> = std::result::Result<T, SpchtError>;

/// Spcht-specific errors
///
/// Load-time failures (`Parse`, `Validation`, `UnknownKey`, `InvalidRegex`,
/// `Reference`) are fatal and abort descriptor compilation. `RecordDiscarded`
/// and `SubjectAmbiguous` are per-record outcomes reported by the driver.
#[derive(Debug, Error)]
pub enum SpchtError {
    /// Error parsing a descriptor or mapping document
    #[error("Parse error: {0}")]
    Parse(String),

    /// Structural violation in a descriptor node
    #[error("Invalid descriptor at {node}: {message}")]
    Validation { node: String, message: String },

    /// Key outside the recognized node vocabulary
    #[error("Unknown key '{key}' in node {node}")]
    UnknownKey { node: String, key: String },

    /// A pattern in `match`, `cut`, an `if_*` variant or a `$regex`
    /// mapping failed to compile
    #[error("Invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    /// `$ref` / `joined_map_ref` could not be resolved
    #[error("Reference '{path}' could not be resolved: {message}")]
    Reference { path: String, message: String },

    /// A mandatory node (or the head) produced no value for this record
    #[error("Record discarded: node '{node}' requires field '{field}' but it yielded nothing")]
    RecordDiscarded { node: String, field: String },

    /// The head node produced more than one subject candidate
    #[error("Subject derivation yielded {count} values, expected exactly one")]
    SubjectAmbiguous { count: usize },

    /// Underlying JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while loading a descriptor or reference file
    #[error("I/O error: {0}")]
    Io(String),

    /// Programming bug; never expected
    #[error("Internal invariant violated: {0}")]
    Internal(String),
}

impl SpchtError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        SpchtError::Parse(msg.into())
    }

    /// Create a validation error for a named node
    pub fn validation(node: impl Into<String>, msg: impl Into<String>) -> Self {
        SpchtError::Validation {
            node: node.into(),
            message: msg.into(),
        }
    }

    /// Create a reference resolution error
    pub fn reference(path: impl Into<String>, msg: impl Into<String>) -> Self {
        SpchtError::Reference {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create an internal invariant error
    pub fn internal(msg: impl Into<String>) -> Self {
        SpchtError::Internal(msg.into())
    }

    /// Check if this is a per-record discard (as opposed to a load failure)
    pub fn is_discard(&self) -> bool {
        matches!(self, SpchtError::RecordDiscarded { .. })
    }
}
