//! # tabrecon
//!
//! Reconciles two versions of a tabular dataset. Columns of the base and
//! updated files are aligned by name similarity, rows are paired by fuzzy
//! field comparison, and every proposal goes through human review before a
//! workflow completes.

pub mod cli;
pub mod columns;
pub mod commands;
pub mod config;
pub mod error;
pub mod ingest;
pub mod matching;
pub mod model;
pub mod output;
pub mod progress;
pub mod reconcile;
pub mod resolver;
pub mod similarity;
pub mod store;
pub mod workflow;
pub mod workspace;

pub use config::ReconConfig;
pub use error::{Result, TabreconError};
pub use reconcile::Reconciler;
pub use resolver::WorkflowResolver;
pub use store::MemoryStore;
pub use workflow::WorkflowStatus;
pub use workspace::TabreconWorkspace;

/// Current format version for tabrecon files
pub const FORMAT_VERSION: &str = "1.0.0";
