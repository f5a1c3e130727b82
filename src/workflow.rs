//! Workflow state machine
//!
//! A workflow advances one stage at a time:
//! `created -> files_uploaded -> columns_mapped -> mapped_columns_reviewed
//! -> results_reviewed -> completed`. Any non-terminal stage may move to
//! `failed`. `completed` and `failed` accept no further transitions.

use crate::error::{Result, TabreconError};
use crate::model::Workflow;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Created,
    #[serde(alias = "data_uploaded")]
    FilesUploaded,
    ColumnsMapped,
    MappedColumnsReviewed,
    ResultsReviewed,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 7] = [
        Self::Created,
        Self::FilesUploaded,
        Self::ColumnsMapped,
        Self::MappedColumnsReviewed,
        Self::ResultsReviewed,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::FilesUploaded => "files_uploaded",
            Self::ColumnsMapped => "columns_mapped",
            Self::MappedColumnsReviewed => "mapped_columns_reviewed",
            Self::ResultsReviewed => "results_reviewed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The next stage on the happy path
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::FilesUploaded),
            Self::FilesUploaded => Some(Self::ColumnsMapped),
            Self::ColumnsMapped => Some(Self::MappedColumnsReviewed),
            Self::MappedColumnsReviewed => Some(Self::ResultsReviewed),
            Self::ResultsReviewed => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.successor() == Some(to)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.to_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("Invalid workflow status: {}", s))
    }
}

/// Move `workflow` from `from` to `to`.
///
/// `from` is the caller's view of the current state; a stale view is rejected
/// just like an out-of-order target. On error the workflow is left untouched.
pub fn transition(workflow: &mut Workflow, from: WorkflowStatus, to: WorkflowStatus) -> Result<()> {
    let current = workflow.status;
    if from != current || !current.can_transition_to(to) {
        return Err(TabreconError::IllegalTransition { current, from, to });
    }

    log::debug!("Workflow {} transition {} -> {}", workflow.id, from, to);
    workflow.status = to;
    workflow.updated_at = Utc::now();
    Ok(())
}

/// Advance `workflow` to its successor stage
pub fn advance(workflow: &mut Workflow) -> Result<WorkflowStatus> {
    let current = workflow.status;
    let next = current.successor().ok_or(TabreconError::IllegalTransition {
        current,
        from: current,
        to: WorkflowStatus::Failed,
    })?;
    transition(workflow, current, next)?;
    Ok(next)
}

/// Move any non-terminal workflow to `failed`
pub fn fail(workflow: &mut Workflow) -> Result<()> {
    let current = workflow.status;
    transition(workflow, current, WorkflowStatus::Failed)
}
