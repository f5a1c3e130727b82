//! Persisted records of a reconciliation workflow

use crate::error::{Result, TabreconError};
use crate::workflow::WorkflowStatus;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Field values of one row, keyed by column name in source order
pub type RowData = IndexMap<String, FieldValue>;

/// A reconciliation task between one base and one updated dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub confidence_threshold: f64,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        confidence_threshold: f64,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TabreconError::invalid_input("Workflow name must not be empty"));
        }
        validate_threshold(confidence_threshold)?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            description: description.into(),
            confidence_threshold,
            status: WorkflowStatus::Created,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Check that a confidence threshold lies in `[0, 1]`
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(TabreconError::invalid_input(format!(
            "Confidence threshold must be between 0 and 1: {}",
            threshold
        )));
    }
    Ok(())
}

/// Which side of the reconciliation a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Base,
    Updated,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

impl FromStr for FileRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "updated" => Ok(Self::Updated),
            _ => Err(format!("Invalid file role: {}. Use 'base' or 'updated'", s)),
        }
    }
}

/// An uploaded dataset attached to a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFile {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub role: FileRole,
    pub filename: String,
    pub size: u64,
    pub columns: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DatasetFile {
    pub fn new(
        workflow_id: Uuid,
        role: FileRole,
        filename: impl Into<String>,
        size: u64,
        columns: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            role,
            filename: filename.into(),
            size,
            columns,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Textual form used for similarity comparison, `None` when the value is missing
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Self::Null => return None,
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.trim().to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// One row of a dataset file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub file_id: Uuid,
    /// Position of the row in its source file
    pub row: u64,
    pub data: RowData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RowRecord {
    pub fn new(workflow_id: Uuid, file_id: Uuid, row: u64, data: RowData) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            file_id,
            row,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn value(&self, column: &str) -> Option<&FieldValue> {
        self.data.get(column)
    }
}

/// A base column paired with an updated column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub base_column: String,
    pub updated_column: String,
    /// Auto-proposed above the alignment cutoff or confirmed by a reviewer
    #[serde(rename = "match")]
    pub is_match: bool,
    #[serde(default)]
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ColumnMapping {
    pub fn new(
        workflow_id: Uuid,
        base_column: impl Into<String>,
        updated_column: impl Into<String>,
        score: f64,
        is_match: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            base_column: base_column.into(),
            updated_column: updated_column.into(),
            is_match,
            score,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Field-level similarity for one compared column pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub base_column: String,
    pub updated_column: String,
    pub confidence: f64,
}

/// Review state of a row match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Pending,
    Confirmed,
    Rejected,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A proposed correspondence between one base row and one updated row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowMatch {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub base_file_id: Uuid,
    pub updated_file_id: Uuid,
    pub base_row_id: Uuid,
    pub updated_row_id: Uuid,
    pub confirmations: Vec<Confirmation>,
    #[serde(default)]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RowMatch {
    /// A pending match between two rows
    pub fn new(
        workflow_id: Uuid,
        base: &RowRecord,
        updated: &RowRecord,
        confirmations: Vec<Confirmation>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            base_file_id: base.file_id,
            updated_file_id: updated.file_id,
            base_row_id: base.id,
            updated_row_id: updated.id,
            confirmations,
            confirmed_at: None,
            rejected_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mean of the per-field confidences
    pub fn confidence(&self) -> f64 {
        if self.confirmations.is_empty() {
            return 0.0;
        }
        self.confirmations.iter().map(|c| c.confidence).sum::<f64>()
            / self.confirmations.len() as f64
    }

    pub fn review_state(&self) -> ReviewState {
        match (self.confirmed_at, self.rejected_at) {
            (_, Some(_)) => ReviewState::Rejected,
            (Some(_), None) => ReviewState::Confirmed,
            (None, None) => ReviewState::Pending,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected_at.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.review_state() == ReviewState::Pending
    }

    pub(crate) fn mark_confirmed(&mut self, at: DateTime<Utc>) {
        self.confirmed_at = Some(at);
        self.rejected_at = None;
        self.updated_at = at;
    }

    pub(crate) fn mark_rejected(&mut self, at: DateTime<Utc>) {
        self.rejected_at = Some(at);
        self.confirmed_at = None;
        self.updated_at = at;
    }
}
