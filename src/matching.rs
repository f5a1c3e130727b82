//! Row matching engine
//!
//! Scores every base/updated row pair over the confirmed column mappings and
//! resolves the scored pairs into a one-to-one assignment. Scoring is
//! embarrassingly parallel and runs on rayon; the final acceptance walk is
//! sequential so the tie-break stays deterministic.

use crate::error::{Result, TabreconError};
use crate::model::{ColumnMapping, Confirmation, RowRecord};
use crate::similarity::{levenshtein_similarity_chars, JaroWinkler};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Average value length above which a column is treated as free text
pub const DEFAULT_LONG_TEXT_LENGTH: usize = 24;

/// Field-level similarity metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMetric {
    /// Normalized edit distance, for long free-text fields
    Levenshtein,
    /// Prefix-weighted Jaro, for short identifier-like fields
    JaroWinkler,
}

impl std::fmt::Display for FieldMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Levenshtein => write!(f, "levenshtein"),
            Self::JaroWinkler => write!(f, "jaro_winkler"),
        }
    }
}

/// Matching parameters for one run
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Confidence at or above which a proposal is eligible for acceptance
    pub confidence_threshold: f64,
    pub winkler: JaroWinkler,
    /// Per base-column metric overrides
    pub metric_overrides: HashMap<String, FieldMetric>,
    /// Columns with a longer average value use Levenshtein when not overridden
    pub long_text_length: usize,
    pub case_sensitive: bool,
    pub parallel: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            winkler: JaroWinkler::default(),
            metric_overrides: HashMap::new(),
            long_text_length: DEFAULT_LONG_TEXT_LENGTH,
            case_sensitive: false,
            parallel: true,
        }
    }
}

impl MatchConfig {
    pub fn with_threshold(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
            ..Self::default()
        }
    }

    /// Anchor similarity below this value makes a pair a pruning candidate
    pub fn prune_below(&self) -> f64 {
        self.confidence_threshold / 2.0
    }

    /// Whether a pair can be discarded from its anchor score alone.
    ///
    /// `comparable` counts the columns with a value on both sides. The pair is
    /// dropped only when perfect scores on every other comparable column would
    /// still leave the mean below the threshold.
    pub fn should_prune(&self, anchor_score: f64, comparable: usize) -> bool {
        if anchor_score >= self.prune_below() || comparable == 0 {
            return false;
        }
        let best_case = (anchor_score + (comparable - 1) as f64) / comparable as f64;
        best_case < self.confidence_threshold
    }
}

/// A scored base/updated pairing chosen by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposedMatch {
    pub base_row_id: Uuid,
    pub updated_row_id: Uuid,
    pub base_file_id: Uuid,
    pub updated_file_id: Uuid,
    pub base_row: u64,
    pub updated_row: u64,
    pub confidence: f64,
    pub confirmations: Vec<Confirmation>,
    /// Confidence reached the workflow's threshold
    pub eligible: bool,
}

/// Everything one matching run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchOutcome {
    /// Accepted pairings, highest confidence first
    pub matches: Vec<ProposedMatch>,
    pub unmatched_base: Vec<Uuid>,
    pub unmatched_updated: Vec<Uuid>,
    pub stats: MatchStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub pairs_considered: u64,
    pub pairs_pruned: u64,
    pub pairs_unscorable: u64,
    pub candidates: u64,
}

/// One mapped column as the engine compares it
#[derive(Debug, Clone)]
struct ColumnPlan {
    base_column: String,
    updated_column: String,
    metric: FieldMetric,
    avg_len: f64,
}

/// Normalized field values of one row, one slot per column plan
type PreparedRow = Vec<Option<Vec<char>>>;

#[derive(Debug, Clone)]
struct Candidate {
    base_idx: usize,
    updated_idx: usize,
    confidence: f64,
    confirmations: Vec<Confirmation>,
}

/// Pair-level scoring result
enum PairScore {
    Pruned,
    Unscorable,
    Scored(Candidate),
}

/// Greedy one-to-one row matcher
#[derive(Debug, Clone, Default)]
pub struct RowMatcher {
    config: MatchConfig,
    blocked: HashSet<(Uuid, Uuid)>,
}

impl RowMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            config,
            blocked: HashSet::new(),
        }
    }

    /// Never propose these `(base_row_id, updated_row_id)` pairs
    pub fn with_blocked(mut self, blocked: impl IntoIterator<Item = (Uuid, Uuid)>) -> Self {
        self.blocked.extend(blocked);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn match_rows(
        &self,
        mappings: &[ColumnMapping],
        base_rows: &[RowRecord],
        updated_rows: &[RowRecord],
    ) -> Result<MatchOutcome> {
        self.match_rows_with_progress(mappings, base_rows, updated_rows, None)
    }

    /// Match rows, reporting `(base rows scored, total base rows)` as scoring advances
    pub fn match_rows_with_progress(
        &self,
        mappings: &[ColumnMapping],
        base_rows: &[RowRecord],
        updated_rows: &[RowRecord],
        progress: Option<&(dyn Fn(u64, u64) + Sync)>,
    ) -> Result<MatchOutcome> {
        let active: Vec<&ColumnMapping> = mappings.iter().filter(|m| m.is_match).collect();
        if active.is_empty() {
            let workflow_id = mappings
                .first()
                .map(|m| m.workflow_id)
                .or_else(|| base_rows.first().map(|r| r.workflow_id))
                .or_else(|| updated_rows.first().map(|r| r.workflow_id))
                .unwrap_or_else(Uuid::nil);
            return Err(TabreconError::NoMappingAvailable { workflow_id });
        }

        if base_rows.is_empty() || updated_rows.is_empty() {
            log::debug!("Nothing to match: {} base, {} updated rows", base_rows.len(), updated_rows.len());
            return Ok(MatchOutcome {
                unmatched_base: base_rows.iter().map(|r| r.id).collect(),
                unmatched_updated: updated_rows.iter().map(|r| r.id).collect(),
                ..MatchOutcome::default()
            });
        }

        let mut plans: Vec<ColumnPlan> = active
            .iter()
            .map(|m| ColumnPlan {
                base_column: m.base_column.clone(),
                updated_column: m.updated_column.clone(),
                metric: FieldMetric::JaroWinkler,
                avg_len: 0.0,
            })
            .collect();

        let base_prepared = self.prepare_rows(base_rows, plans.iter().map(|p| p.base_column.as_str()));
        let updated_prepared =
            self.prepare_rows(updated_rows, plans.iter().map(|p| p.updated_column.as_str()));

        for (k, plan) in plans.iter_mut().enumerate() {
            plan.avg_len = average_len(&base_prepared, &updated_prepared, k);
            plan.metric = match self.config.metric_overrides.get(&plan.base_column) {
                Some(metric) => *metric,
                None if plan.avg_len > self.config.long_text_length as f64 => FieldMetric::Levenshtein,
                None => FieldMetric::JaroWinkler,
            };
        }
        let anchor = anchor_column(&plans);

        log::debug!(
            "Matching {} x {} rows over {} column(s); anchor column '{}'",
            base_rows.len(),
            updated_rows.len(),
            plans.len(),
            plans[anchor].base_column
        );

        let total = base_rows.len() as u64;
        let done = AtomicU64::new(0);
        let score_base_row = |bi: usize| -> Vec<PairScore> {
            let scores = (0..updated_rows.len())
                .filter(|&ui| !self.blocked.contains(&(base_rows[bi].id, updated_rows[ui].id)))
                .map(|ui| {
                    self.score_pair(&plans, anchor, bi, &base_prepared[bi], ui, &updated_prepared[ui])
                })
                .collect();
            if let Some(report) = progress {
                report(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            }
            scores
        };

        let scored: Vec<Vec<PairScore>> = if self.config.parallel {
            (0..base_rows.len()).into_par_iter().map(score_base_row).collect()
        } else {
            (0..base_rows.len()).map(score_base_row).collect()
        };

        let mut stats = MatchStats::default();
        let mut candidates = Vec::new();
        for score in scored.into_iter().flatten() {
            stats.pairs_considered += 1;
            match score {
                PairScore::Pruned => stats.pairs_pruned += 1,
                PairScore::Unscorable => stats.pairs_unscorable += 1,
                PairScore::Scored(candidate) => candidates.push(candidate),
            }
        }
        stats.candidates = candidates.len() as u64;

        let outcome = self.resolve(candidates, base_rows, updated_rows, stats);
        log::info!(
            "Proposed {} row match(es); {} base and {} updated row(s) unmatched",
            outcome.matches.len(),
            outcome.unmatched_base.len(),
            outcome.unmatched_updated.len()
        );
        Ok(outcome)
    }

    /// Normalize the values a row holds for each planned column
    fn prepare_rows<'a>(
        &self,
        rows: &[RowRecord],
        columns: impl Iterator<Item = &'a str> + Clone,
    ) -> Vec<PreparedRow> {
        rows.iter()
            .map(|row| {
                columns
                    .clone()
                    .map(|column| {
                        row.value(column).and_then(|v| v.as_text()).map(|text| {
                            if self.config.case_sensitive {
                                text.chars().collect()
                            } else {
                                text.to_lowercase().chars().collect()
                            }
                        })
                    })
                    .collect()
            })
            .collect()
    }

    fn field_similarity(&self, metric: FieldMetric, a: &[char], b: &[char]) -> f64 {
        match metric {
            FieldMetric::Levenshtein => levenshtein_similarity_chars(a, b),
            FieldMetric::JaroWinkler => self.config.winkler.similarity_chars(a, b),
        }
    }

    fn score_pair(
        &self,
        plans: &[ColumnPlan],
        anchor: usize,
        base_idx: usize,
        base: &PreparedRow,
        updated_idx: usize,
        updated: &PreparedRow,
    ) -> PairScore {
        let anchor_score = match (&base[anchor], &updated[anchor]) {
            (Some(a), Some(b)) => {
                let score = self.field_similarity(plans[anchor].metric, a, b);
                let comparable = base
                    .iter()
                    .zip(updated.iter())
                    .filter(|(a, b)| a.is_some() && b.is_some())
                    .count();
                if self.config.should_prune(score, comparable) {
                    return PairScore::Pruned;
                }
                Some(score)
            }
            _ => None,
        };

        let mut confirmations = Vec::with_capacity(plans.len());
        for (k, plan) in plans.iter().enumerate() {
            let (Some(a), Some(b)) = (&base[k], &updated[k]) else {
                continue;
            };
            let confidence = match anchor_score {
                Some(score) if k == anchor => score,
                _ => self.field_similarity(plan.metric, a, b),
            };
            confirmations.push(Confirmation {
                base_column: plan.base_column.clone(),
                updated_column: plan.updated_column.clone(),
                confidence,
            });
        }

        if confirmations.is_empty() {
            return PairScore::Unscorable;
        }

        let confidence =
            confirmations.iter().map(|c| c.confidence).sum::<f64>() / confirmations.len() as f64;
        PairScore::Scored(Candidate {
            base_idx,
            updated_idx,
            confidence,
            confirmations,
        })
    }

    /// Greedy acceptance: best confidence first, then base row, then updated row
    fn resolve(
        &self,
        mut candidates: Vec<Candidate>,
        base_rows: &[RowRecord],
        updated_rows: &[RowRecord],
        stats: MatchStats,
    ) -> MatchOutcome {
        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| base_rows[a.base_idx].row.cmp(&base_rows[b.base_idx].row))
                .then_with(|| updated_rows[a.updated_idx].row.cmp(&updated_rows[b.updated_idx].row))
                .then_with(|| a.base_idx.cmp(&b.base_idx))
                .then_with(|| a.updated_idx.cmp(&b.updated_idx))
        });

        let mut base_claimed = vec![false; base_rows.len()];
        let mut updated_claimed = vec![false; updated_rows.len()];
        let mut matches = Vec::new();

        for candidate in candidates {
            if base_claimed[candidate.base_idx] || updated_claimed[candidate.updated_idx] {
                continue;
            }
            base_claimed[candidate.base_idx] = true;
            updated_claimed[candidate.updated_idx] = true;

            let base = &base_rows[candidate.base_idx];
            let updated = &updated_rows[candidate.updated_idx];
            matches.push(ProposedMatch {
                base_row_id: base.id,
                updated_row_id: updated.id,
                base_file_id: base.file_id,
                updated_file_id: updated.file_id,
                base_row: base.row,
                updated_row: updated.row,
                eligible: candidate.confidence >= self.config.confidence_threshold,
                confidence: candidate.confidence,
                confirmations: candidate.confirmations,
            });
        }

        MatchOutcome {
            matches,
            unmatched_base: unclaimed_ids(base_rows, &base_claimed),
            unmatched_updated: unclaimed_ids(updated_rows, &updated_claimed),
            stats,
        }
    }
}

fn unclaimed_ids(rows: &[RowRecord], claimed: &[bool]) -> Vec<Uuid> {
    rows.iter()
        .zip(claimed)
        .filter(|(_, claimed)| !**claimed)
        .map(|(row, _)| row.id)
        .collect()
}

/// Mean length of the present values of column `k` across both sides
fn average_len(base: &[PreparedRow], updated: &[PreparedRow], k: usize) -> f64 {
    let (sum, count) = base
        .iter()
        .chain(updated.iter())
        .filter_map(|row| row[k].as_ref())
        .fold((0usize, 0usize), |(sum, count), value| (sum + value.len(), count + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// The cheapest column to compare: shortest average value, first on ties
fn anchor_column(plans: &[ColumnPlan]) -> usize {
    plans
        .iter()
        .enumerate()
        .fold(0, |best, (k, plan)| if plan.avg_len < plans[best].avg_len { k } else { best })
}
