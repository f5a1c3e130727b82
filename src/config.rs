//! Workspace configuration for reconciliation runs

use crate::columns::{ColumnResolver, DEFAULT_MIN_SIMILARITY};
use crate::error::{Result, TabreconError};
use crate::matching::{FieldMetric, MatchConfig, DEFAULT_LONG_TEXT_LENGTH};
use crate::similarity::JaroWinkler;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Tunables stored in `.tabrecon/config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub format_version: String,
    /// Minimum column-name similarity for an automatic mapping
    pub column_min_similarity: f64,
    /// Threshold given to new workflows unless one is supplied
    pub default_confidence_threshold: f64,
    pub prefix_weight: f64,
    pub prefix_length: usize,
    /// Average value length above which a column is compared with Levenshtein
    pub long_text_length: usize,
    pub case_sensitive: bool,
    pub parallel: bool,
    /// Metric overrides keyed by base column name
    pub column_metrics: HashMap<String, FieldMetric>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            format_version: crate::FORMAT_VERSION.to_string(),
            column_min_similarity: DEFAULT_MIN_SIMILARITY,
            default_confidence_threshold: 0.8,
            prefix_weight: 0.1,
            prefix_length: 4,
            long_text_length: DEFAULT_LONG_TEXT_LENGTH,
            case_sensitive: false,
            parallel: true,
            column_metrics: HashMap::new(),
        }
    }
}

impl ReconConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| TabreconError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file if present, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.column_min_similarity) {
            return Err(TabreconError::config(format!(
                "column_min_similarity must be between 0 and 1: {}",
                self.column_min_similarity
            )));
        }
        if !(0.0..=1.0).contains(&self.default_confidence_threshold) {
            return Err(TabreconError::config(format!(
                "default_confidence_threshold must be between 0 and 1: {}",
                self.default_confidence_threshold
            )));
        }
        if self.prefix_weight < 0.0 || self.prefix_weight * self.prefix_length as f64 > 1.0 {
            return Err(TabreconError::config(format!(
                "prefix_weight x prefix_length must stay within [0, 1]: {} x {}",
                self.prefix_weight, self.prefix_length
            )));
        }
        Ok(())
    }

    pub fn winkler(&self) -> JaroWinkler {
        JaroWinkler::new(self.prefix_weight, self.prefix_length)
    }

    pub fn column_resolver(&self) -> ColumnResolver {
        ColumnResolver::new(self.column_min_similarity, self.winkler())
    }

    /// Matching parameters for a workflow with the given threshold
    pub fn match_config(&self, confidence_threshold: f64) -> MatchConfig {
        MatchConfig {
            confidence_threshold,
            winkler: self.winkler(),
            metric_overrides: self.column_metrics.clone(),
            long_text_length: self.long_text_length,
            case_sensitive: self.case_sensitive,
            parallel: self.parallel,
        }
    }
}
