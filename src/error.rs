//! Error types for tabrecon operations

use crate::model::FileRole;
use crate::workflow::WorkflowStatus;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, TabreconError>;

#[derive(Error, Debug)]
pub enum TabreconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No confirmed column mappings for workflow {workflow_id}; review the column mapping first")]
    NoMappingAvailable { workflow_id: Uuid },

    #[error("Illegal transition {from} -> {to}: workflow is currently {current}")]
    IllegalTransition {
        current: WorkflowStatus,
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error("Column '{column}' is assigned more than once on the {side} side")]
    DuplicateColumnAssignment { side: FileRole, column: String },

    #[error("Row {row_id} already belongs to another active match")]
    DuplicateRowAssignment { row_id: Uuid },

    #[error("Cannot {stage} while workflow is {status}")]
    StageNotAllowed {
        stage: &'static str,
        status: WorkflowStatus,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("Workflow not found: {reference}")]
    WorkflowNotFound { reference: String },

    #[error("Reference '{reference}' is ambiguous: matches {candidates:?}")]
    AmbiguousReference {
        reference: String,
        candidates: Vec<String>,
    },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl TabreconError {
    pub fn workspace(msg: impl Into<String>) -> Self {
        Self::Workspace(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    /// Whether the caller can recover by revisiting an earlier review step.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoMappingAvailable { .. }
                | Self::IllegalTransition { .. }
                | Self::StageNotAllowed { .. }
                | Self::DuplicateColumnAssignment { .. }
                | Self::DuplicateRowAssignment { .. }
        )
    }
}
