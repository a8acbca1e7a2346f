//! Error types for the evaluation dashboard.
//!
//! Library-style modules return [`DashError`]; the binary layer wraps
//! these in `anyhow` with context and maps client errors to exit code 2.

use thiserror::Error;

/// Errors produced by aggregation, obfuscation, ingestion and the store.
#[derive(Error, Debug)]
pub enum DashError {
    /// A stored record carries a timestamp that cannot be parsed.
    #[error("Malformed record {id}: unparsable created_at '{value}'")]
    MalformedRecord { id: String, value: String },

    /// Obfuscation was asked to handle a null or non-string value.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A required ingest field is absent or empty.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// An ingest field is present but cannot be coerced.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Settings outside their allowed range.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Lookup of a record that does not exist for this owner.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing store could not complete the operation.
    #[error("Store error: {0}")]
    Store(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DashError {
    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DashError::MissingField(_)
                | DashError::InvalidField { .. }
                | DashError::InvalidSettings(_)
                | DashError::InvalidInput(_)
                | DashError::NotFound(_)
        )
    }

    pub(crate) fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        DashError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for dashboard operations.
pub type Result<T> = std::result::Result<T, DashError>;
