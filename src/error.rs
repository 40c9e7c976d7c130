//! Error taxonomy
//!
//! Every failure the engine or the REST collaborator can surface. Terminal
//! errors carry the field, operation or diff list that caused them so a
//! caller can act without re-running with debug logging.

use crate::dcl::diff::FieldDiff;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = DclError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DclError {
    /// Malformed or incomplete desired input, detected before any network call
    #[error("invalid value for `{field}`: {message}")]
    Validation { field: String, message: String },

    /// The resource does not exist. Drives create-vs-update branching.
    #[error("not found: {0}")]
    NotFound(String),

    /// Concurrent modification (HTTP 409)
    #[error("conflict: {0}")]
    Conflict(String),

    /// A required change cannot be applied
    #[error("infeasible change to `{subject}`: {reason}")]
    Infeasible { subject: String, reason: String },

    /// Post-apply verification found residual differences
    #[error("{kind} still differs after apply: {}", format_diffs(.diffs))]
    DriftAfterApply { kind: String, diffs: Vec<FieldDiff> },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("API request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A platform long-running operation finished in error
    #[error("operation {operation} failed: {message}")]
    OperationFailed { operation: String, message: String },

    #[error("{resource} still exists after {attempts} delete checks")]
    NotDeleted { resource: String, attempts: u32 },

    #[error("{} errors: {}", .0.len(), format_errors(.0))]
    Aggregate(Vec<DclError>),

    /// Failure of one operation of an apply plan
    #[error("{operation}: {source}")]
    Step {
        operation: String,
        #[source]
        source: Box<DclError>,
    },

    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl DclError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infeasible(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Infeasible {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a 409-class error, looking through plan step context
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Step { source, .. } => source.is_conflict(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Step { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for DclError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                operation: err
                    .url()
                    .map(|u| u.path().to_string())
                    .unwrap_or_else(|| "request".to_string()),
                after: Duration::ZERO,
            };
        }
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for DclError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

fn format_diffs(diffs: &[FieldDiff]) -> String {
    diffs
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_errors(errors: &[DclError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
