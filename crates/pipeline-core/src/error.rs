//! Error types for the pipeline status machine
//!
//! Query functions never fail on unknown ids; errors only appear when a table
//! is loaded or when a caller asks for a transition to be validated before it
//! is committed to a lead.

use thiserror::Error;

/// Result type alias for pipeline-core operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// A single integrity problem found while validating a status table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableViolation {
    #[error("table defines no statuses")]
    Empty,

    #[error("status id must not be empty (entry #{index})")]
    EmptyId { index: usize },

    #[error("status '{id}' is defined more than once")]
    DuplicateId { id: String },

    #[error("status '{from}' lists unknown transition target '{to}'")]
    DanglingTransition { from: String, to: String },

    #[error("terminal status '{id}' must not list transitions")]
    TerminalWithTransitions { id: String },

    #[error("non-terminal status '{id}' has no outgoing transitions")]
    DeadEnd { id: String },
}

/// Errors produced by pipeline-core
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("Invalid status table: {}", join_violations(.violations))]
    InvalidTable { violations: Vec<TableViolation> },

    #[error("Failed to parse status table: {reason}")]
    TableParse { reason: String },

    #[error("Failed to read status table from {path}: {reason}")]
    TableIo { path: String, reason: String },

    #[error("Unknown pipeline status: {id}")]
    UnknownStatus { id: String },

    #[error("Transition from '{from}' to '{to}' is not allowed")]
    TransitionNotAllowed { from: String, to: String },

    #[error("A note is required when moving a lead to '{status}'")]
    NoteRequired { status: String },
}

impl PipelineError {
    /// Create an unknown status error
    pub fn unknown_status(id: impl Into<String>) -> Self {
        Self::UnknownStatus { id: id.into() }
    }

    /// Create a table parse error
    pub fn table_parse(reason: impl Into<String>) -> Self {
        Self::TableParse { reason: reason.into() }
    }

    /// Whether the error came from a lead transition check rather than from
    /// loading a table
    pub fn is_transition_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnknownStatus { .. }
                | PipelineError::TransitionNotAllowed { .. }
                | PipelineError::NoteRequired { .. }
        )
    }
}

fn join_violations(violations: &[TableViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::table_parse(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::table_parse(err.to_string())
    }
}
