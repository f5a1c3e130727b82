//! Column alignment between the base and updated datasets

use crate::error::{Result, TabreconError};
use crate::model::{ColumnMapping, FileRole};
use crate::similarity::JaroWinkler;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use uuid::Uuid;

/// Default minimum name similarity for an automatic column proposal
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.7;

/// A proposed base/updated column pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProposal {
    pub base_column: String,
    pub updated_column: String,
    pub score: f64,
}

/// Result of aligning two column lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAlignment {
    /// Proposals in the order they were accepted (highest score first)
    pub proposals: Vec<ColumnProposal>,
    /// Base columns without a counterpart, in base order
    pub unmatched_base: Vec<String>,
    /// Updated columns without a counterpart, in updated order
    pub unmatched_updated: Vec<String>,
}

impl ColumnAlignment {
    /// Turn accepted proposals into mapping records for a workflow
    pub fn to_mappings(&self, workflow_id: Uuid) -> Vec<ColumnMapping> {
        self.proposals
            .iter()
            .map(|p| {
                ColumnMapping::new(
                    workflow_id,
                    p.base_column.clone(),
                    p.updated_column.clone(),
                    p.score,
                    true,
                )
            })
            .collect()
    }
}

/// Greedy name-similarity resolver
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    min_similarity: f64,
    metric: JaroWinkler,
}

impl Default for ColumnResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIMILARITY, JaroWinkler::default())
    }
}

impl ColumnResolver {
    pub fn new(min_similarity: f64, metric: JaroWinkler) -> Self {
        Self {
            min_similarity,
            metric,
        }
    }

    pub fn min_similarity(&self) -> f64 {
        self.min_similarity
    }

    /// Similarity of two column names.
    ///
    /// The better of Jaro-Winkler on the whole lower-cased names and a
    /// token-level score, so `Name` still finds `full_name`.
    pub fn name_similarity(&self, base: &str, updated: &str) -> f64 {
        let whole = self.metric.similarity(
            &base.trim().to_lowercase(),
            &updated.trim().to_lowercase(),
        );
        whole.max(self.token_similarity(&name_tokens(base), &name_tokens(updated)))
    }

    /// Mean of each side's average best-token score
    fn token_similarity(&self, base: &[String], updated: &[String]) -> f64 {
        if base.is_empty() || updated.is_empty() {
            return 0.0;
        }
        let side = |from: &[String], to: &[String]| {
            from.iter()
                .map(|t| {
                    to.iter()
                        .map(|u| self.metric.similarity(t, u))
                        .fold(0.0, f64::max)
                })
                .sum::<f64>()
                / from.len() as f64
        };
        (side(base, updated) + side(updated, base)) / 2.0
    }

    /// Dense `base.len() x updated.len()` similarity matrix
    pub fn similarity_matrix(&self, base: &[String], updated: &[String]) -> Vec<Vec<f64>> {
        base.iter()
            .map(|b| updated.iter().map(|u| self.name_similarity(b, u)).collect())
            .collect()
    }

    /// Propose a 1:1 column mapping.
    ///
    /// Repeatedly takes the highest scoring pair whose columns are both still
    /// free, until nothing left reaches `min_similarity`. Equal scores go to the
    /// earlier base column, then to the earlier updated column.
    pub fn resolve(&self, base: &[String], updated: &[String]) -> ColumnAlignment {
        let matrix = self.similarity_matrix(base, updated);

        let mut candidates: Vec<(usize, usize, f64)> = matrix
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().enumerate().map(move |(j, score)| (i, j, *score)))
            .filter(|(_, _, score)| *score >= self.min_similarity)
            .collect();

        // Walking this order is the same as picking the maximum each round
        candidates.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.cmp(&b.1))
        });

        let mut base_taken = vec![false; base.len()];
        let mut updated_taken = vec![false; updated.len()];
        let mut proposals = Vec::new();

        for (i, j, score) in candidates {
            if base_taken[i] || updated_taken[j] {
                continue;
            }
            base_taken[i] = true;
            updated_taken[j] = true;
            proposals.push(ColumnProposal {
                base_column: base[i].clone(),
                updated_column: updated[j].clone(),
                score,
            });
        }

        let unmatched_base = unclaimed(base, &base_taken);
        let unmatched_updated = unclaimed(updated, &updated_taken);

        log::debug!(
            "Aligned {} column pair(s); {} base and {} updated column(s) left for manual mapping",
            proposals.len(),
            unmatched_base.len(),
            unmatched_updated.len()
        );

        ColumnAlignment {
            proposals,
            unmatched_base,
            unmatched_updated,
        }
    }
}

fn unclaimed(names: &[String], taken: &[bool]) -> Vec<String> {
    names
        .iter()
        .zip(taken)
        .filter(|(_, taken)| !**taken)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Split a column name into lower-cased words on separators and camelCase humps
pub fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.trim().chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        current.extend(c.to_lowercase());
        prev_lower = c.is_lowercase() || c.is_numeric();
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Reject a mapping set that uses any column twice on the same side
pub fn validate_mappings(mappings: &[ColumnMapping]) -> Result<()> {
    let mut base_seen = HashSet::new();
    let mut updated_seen = HashSet::new();

    for mapping in mappings {
        if !base_seen.insert(mapping.base_column.as_str()) {
            return Err(TabreconError::DuplicateColumnAssignment {
                side: FileRole::Base,
                column: mapping.base_column.clone(),
            });
        }
        if !updated_seen.insert(mapping.updated_column.as_str()) {
            return Err(TabreconError::DuplicateColumnAssignment {
                side: FileRole::Updated,
                column: mapping.updated_column.clone(),
            });
        }
    }

    Ok(())
}

/// Order mappings by the position of their base column in `base_columns`
pub fn sort_by_base_order(mappings: &mut [ColumnMapping], base_columns: &[String]) {
    let position = |name: &str| base_columns.iter().position(|c| c == name);
    mappings.sort_by(|a, b| match (position(&a.base_column), position(&b.base_column)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.base_column.cmp(&b.base_column),
    });
}
