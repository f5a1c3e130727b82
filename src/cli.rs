//! Command-line interface for tabrecon

use crate::model::ReviewState;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tabrecon")]
#[command(about = "Reconcile two versions of a tabular dataset")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override workspace location
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize tabrecon workspace
    Init {
        /// Overwrite an existing config with defaults
        #[arg(long)]
        force: bool,
    },

    /// Create a reconciliation workflow
    Create {
        /// Workflow name
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Confidence threshold for eligible matches (defaults to the workspace config)
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,
    },

    /// List workflows
    List {
        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Show a workflow summary (defaults to the most recently updated)
    Show {
        workflow: Option<String>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Attach base and/or updated data files (.csv, .tsv, .json)
    Upload {
        workflow: String,

        /// Base (older) dataset
        #[arg(long)]
        base: Option<PathBuf>,

        /// Updated (newer) dataset
        #[arg(long)]
        updated: Option<PathBuf>,
    },

    /// Propose column mappings from column-name similarity
    Align {
        workflow: String,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Map a base column to an updated column by hand
    Map {
        workflow: String,
        base_column: String,
        updated_column: String,
    },

    /// Include or exclude a mapped base column from row matching
    Column {
        workflow: String,
        base_column: String,

        /// "match" or "ignore"
        state: String,
    },

    /// Accept the column mapping and unlock row matching
    ReviewColumns { workflow: String },

    /// Run row matching
    Match {
        workflow: String,

        /// Replace the workflow's confidence threshold before matching
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<f64>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// List row matches
    Matches {
        workflow: String,

        /// Filter: "all", "pending", "confirmed", "rejected"
        #[arg(long, default_value = "all")]
        state: String,

        /// Show at most this many matches
        #[arg(long)]
        limit: Option<usize>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Confirm row matches by id or id prefix
    Confirm {
        workflow: String,

        match_ids: Vec<String>,

        /// Confirm every pending match at or above the threshold
        #[arg(long)]
        eligible: bool,
    },

    /// Reject row matches by id or id prefix
    Reject {
        workflow: String,

        #[arg(required = true)]
        match_ids: Vec<String>,
    },

    /// Finish reviewing matches
    ReviewResults { workflow: String },

    /// Mark a reviewed workflow completed
    Complete { workflow: String },

    /// Mark a workflow failed
    Fail { workflow: String },

    /// Delete a workflow and everything attached to it
    Delete {
        workflow: String,

        /// Required to actually delete
        #[arg(long)]
        force: bool,
    },

    /// Export matches with their row values
    Export {
        workflow: String,

        /// Output file (defaults to .tabrecon/exports/<workflow>.<format>)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Export format: "csv", "json"
        #[arg(long, default_value = "csv")]
        format: String,

        /// Include pending matches, not only confirmed ones
        #[arg(long)]
        all: bool,
    },
}

/// Parse output format string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

/// Parse export format string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid export format: {}. Use 'csv' or 'json'", s)),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Which matches a listing shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFilter {
    All,
    Only(ReviewState),
}

impl MatchFilter {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "pending" => Ok(Self::Only(ReviewState::Pending)),
            "confirmed" => Ok(Self::Only(ReviewState::Confirmed)),
            "rejected" => Ok(Self::Only(ReviewState::Rejected)),
            _ => Err(format!(
                "Invalid match state: {}. Use 'all', 'pending', 'confirmed' or 'rejected'",
                s
            )),
        }
    }

    pub fn accepts(&self, state: ReviewState) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => *wanted == state,
        }
    }
}

/// Parse the state argument of `column`
pub fn parse_column_state(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "match" | "include" => Ok(true),
        "ignore" | "exclude" => Ok(false),
        _ => Err(format!("Invalid column state: {}. Use 'match' or 'ignore'", s)),
    }
}

/// Validate that a threshold lies in [0, 1]
fn parse_threshold(s: &str) -> Result<f64, String> {
    let threshold: f64 = s
        .parse()
        .map_err(|_| format!("Invalid threshold: '{}'. Must be a number between 0 and 1.", s))?;

    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("Threshold must be between 0 and 1: {}", threshold));
    }

    Ok(threshold)
}
