//! Error types for the schema gate

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for schema gate operations
pub type Result<T> = std::result::Result<T, CheckError>;

/// Errors raised while checking schemas.
///
/// Negative verdicts (an incompatible change, an invalid schema) are not errors;
/// they come back as a [`crate::Verdict`] with issues.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot parse {format} schema ({location}): {reason}")]
    SchemaParse {
        format: String,
        location: String,
        reason: String,
    },

    #[error("unknown level: {0}")]
    UnknownLevel(String),

    #[error("schema history is null")]
    MissingHistory,

    #[error("{format} engine does not support {operation}")]
    UnsupportedOperation { format: String, operation: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome classes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No engine registered for the requested format
    UnsupportedFormat,
    /// Candidate or history entry could not be parsed
    SchemaParseError,
    /// Schema parses but breaks syntax/semantic rules
    ValidationFailed,
    /// Schema fails one or more directional compatibility tests
    IncompatibleChange,
    /// The engine exists but cannot perform the requested check
    UnsupportedOperation,
    /// The request itself is malformed: bad body, unknown level, missing history
    InvalidRequest,
    /// Anything the caller did not cause
    InternalFault,
}

impl FailureKind {
    /// Whether the failure was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        !matches!(self, FailureKind::InternalFault)
    }
}

impl CheckError {
    /// Build a parse error for a schema at `location` (e.g. `candidate`, `history[2]`)
    pub fn parse(format: impl Into<String>, location: impl Into<String>, reason: impl ToString) -> Self {
        CheckError::SchemaParse {
            format: format.into(),
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify this error into the caller-facing taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            CheckError::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            CheckError::UnsupportedOperation { .. } => FailureKind::UnsupportedOperation,
            CheckError::SchemaParse { .. } => FailureKind::SchemaParseError,
            CheckError::UnknownLevel(_)
            | CheckError::MissingHistory
            | CheckError::InvalidRequest(_)
            | CheckError::Json(_) => FailureKind::InvalidRequest,
            CheckError::Internal(_) | CheckError::Io(_) => FailureKind::InternalFault,
        }
    }

    /// Whether the caller's input is wrong (as opposed to the gate failing)
    pub fn is_client_error(&self) -> bool {
        self.kind().is_client_error()
    }
}
