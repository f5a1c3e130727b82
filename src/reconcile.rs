//! Reconciliation service
//!
//! `Reconciler` runs the workflow stages against a [`Store`]. It is the only
//! place that changes a workflow's status, flips a column mapping's `match`
//! flag, or stamps `confirmed_at` / `rejected_at` on a row match. Each stage
//! checks the workflow's current status before touching anything.

use crate::columns::{sort_by_base_order, validate_mappings, ColumnAlignment};
use crate::config::ReconConfig;
use crate::error::{Result, TabreconError};
use crate::ingest::LoadedDataset;
use crate::matching::{MatchOutcome, RowMatcher};
use crate::model::{
    validate_threshold, ColumnMapping, DatasetFile, FileRole, ReviewState, RowMatch, RowRecord,
    Workflow,
};
use crate::store::{Repository, Store};
use crate::workflow::{self, WorkflowStatus};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

const MAPPING_STAGES: &[WorkflowStatus] = &[
    WorkflowStatus::ColumnsMapped,
    WorkflowStatus::MappedColumnsReviewed,
];

const REVIEW_STAGES: &[WorkflowStatus] = &[
    WorkflowStatus::MappedColumnsReviewed,
    WorkflowStatus::ResultsReviewed,
];

/// What a matching run changed
#[derive(Debug, Clone, Serialize)]
pub struct MatchRun {
    /// Newly stored pending matches, highest confidence first
    pub created: Vec<RowMatch>,
    /// Pending matches from the previous run that were discarded
    pub discarded: usize,
    /// Confirmed matches carried over untouched
    pub kept_confirmed: usize,
    pub outcome: MatchOutcome,
}

/// Review counts for one workflow
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSummary {
    pub workflow: Workflow,
    pub files: Vec<DatasetFile>,
    pub mappings: usize,
    pub active_mappings: usize,
    pub base_rows: usize,
    pub updated_rows: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub rejected: usize,
    /// Rows not covered by any pending or confirmed match
    pub unmatched_base: usize,
    pub unmatched_updated: usize,
}

/// One compared field of a match, with the values shown to a reviewer
#[derive(Debug, Clone, Serialize)]
pub struct FieldComparison {
    pub base_column: String,
    pub updated_column: String,
    pub base_value: String,
    pub updated_value: String,
    pub confidence: f64,
}

/// A row match joined with the rows it pairs
#[derive(Debug, Clone, Serialize)]
pub struct MatchDetail {
    pub id: Uuid,
    pub state: ReviewState,
    pub confidence: f64,
    pub base_row: u64,
    pub updated_row: u64,
    pub fields: Vec<FieldComparison>,
}

pub struct Reconciler<S: Store> {
    store: S,
    config: ReconConfig,
}

impl<S: Store> Reconciler<S> {
    pub fn new(store: S, config: ReconConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    // Queries

    pub fn workflow(&self, workflow_id: Uuid) -> Result<Workflow> {
        Repository::<Workflow>::get(&self.store, workflow_id)
    }

    pub fn workflows(&self) -> Result<Vec<Workflow>> {
        Repository::<Workflow>::list(&self.store)
    }

    pub fn files(&self, workflow_id: Uuid) -> Result<Vec<DatasetFile>> {
        Repository::<DatasetFile>::list_by_workflow(&self.store, workflow_id)
    }

    pub fn file(&self, workflow_id: Uuid, role: FileRole) -> Result<Option<DatasetFile>> {
        Ok(self.files(workflow_id)?.into_iter().find(|f| f.role == role))
    }

    /// Rows of one file in source order
    pub fn rows(&self, workflow_id: Uuid, file_id: Uuid) -> Result<Vec<RowRecord>> {
        let mut rows: Vec<RowRecord> = Repository::<RowRecord>::list_by_workflow(&self.store, workflow_id)?
            .into_iter()
            .filter(|r| r.file_id == file_id)
            .collect();
        rows.sort_by_key(|r| r.row);
        Ok(rows)
    }

    pub fn row(&self, row_id: Uuid) -> Result<RowRecord> {
        Repository::<RowRecord>::get(&self.store, row_id)
    }

    /// Mappings ordered by the base file's column order
    pub fn mappings(&self, workflow_id: Uuid) -> Result<Vec<ColumnMapping>> {
        let mut mappings = Repository::<ColumnMapping>::list_by_workflow(&self.store, workflow_id)?;
        if let Some(base) = self.file(workflow_id, FileRole::Base)? {
            sort_by_base_order(&mut mappings, &base.columns);
        }
        Ok(mappings)
    }

    /// Matches ordered by confidence, highest first
    pub fn matches(&self, workflow_id: Uuid) -> Result<Vec<RowMatch>> {
        let mut matches = Repository::<RowMatch>::list_by_workflow(&self.store, workflow_id)?;
        matches.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
        Ok(matches)
    }

    /// Matches joined with their row values, highest confidence first
    pub fn match_details(&self, workflow_id: Uuid) -> Result<Vec<MatchDetail>> {
        self.matches(workflow_id)?
            .into_iter()
            .map(|m| -> Result<MatchDetail> {
                let base = self.row(m.base_row_id)?;
                let updated = self.row(m.updated_row_id)?;
                let text = |row: &RowRecord, column: &str| {
                    row.value(column).map(|v| v.to_string()).unwrap_or_default()
                };
                let fields = m
                    .confirmations
                    .iter()
                    .map(|c| FieldComparison {
                        base_column: c.base_column.clone(),
                        updated_column: c.updated_column.clone(),
                        base_value: text(&base, &c.base_column),
                        updated_value: text(&updated, &c.updated_column),
                        confidence: c.confidence,
                    })
                    .collect();
                Ok(MatchDetail {
                    id: m.id,
                    state: m.review_state(),
                    confidence: m.confidence(),
                    base_row: base.row,
                    updated_row: updated.row,
                    fields,
                })
            })
            .collect()
    }

    pub fn summary(&self, workflow_id: Uuid) -> Result<WorkflowSummary> {
        let workflow = self.workflow(workflow_id)?;
        let files = self.files(workflow_id)?;
        let mappings = Repository::<ColumnMapping>::list_by_workflow(&self.store, workflow_id)?;
        let rows = Repository::<RowRecord>::list_by_workflow(&self.store, workflow_id)?;
        let matches = Repository::<RowMatch>::list_by_workflow(&self.store, workflow_id)?;

        let file_of = |role: FileRole| files.iter().find(|f| f.role == role).map(|f| f.id);
        let base_file = file_of(FileRole::Base);
        let updated_file = file_of(FileRole::Updated);

        let mut covered = HashSet::new();
        let (mut pending, mut confirmed, mut rejected) = (0, 0, 0);
        for m in &matches {
            match m.review_state() {
                ReviewState::Pending => pending += 1,
                ReviewState::Confirmed => confirmed += 1,
                ReviewState::Rejected => {
                    rejected += 1;
                    continue;
                }
            }
            covered.insert(m.base_row_id);
            covered.insert(m.updated_row_id);
        }

        let count = |file: Option<Uuid>, uncovered: bool| {
            rows.iter()
                .filter(|r| Some(r.file_id) == file)
                .filter(|r| !uncovered || !covered.contains(&r.id))
                .count()
        };

        Ok(WorkflowSummary {
            mappings: mappings.len(),
            active_mappings: mappings.iter().filter(|m| m.is_match).count(),
            base_rows: count(base_file, false),
            updated_rows: count(updated_file, false),
            unmatched_base: count(base_file, true),
            unmatched_updated: count(updated_file, true),
            pending,
            confirmed,
            rejected,
            workflow,
            files,
        })
    }

    // Workflow lifecycle

    /// Create an empty workflow; `None` uses the configured default threshold
    pub fn create_workflow(
        &mut self,
        name: &str,
        description: &str,
        confidence_threshold: Option<f64>,
    ) -> Result<Workflow> {
        let threshold = confidence_threshold.unwrap_or(self.config.default_confidence_threshold);
        let workflow = Workflow::new(name.trim(), description, threshold)?;
        let workflow = Repository::<Workflow>::create(&mut self.store, workflow)?;
        log::info!("Created workflow '{}' ({})", workflow.name, workflow.id);
        Ok(workflow)
    }

    /// Change the threshold used by later matching runs and `confirm_eligible`
    pub fn set_threshold(&mut self, workflow_id: Uuid, confidence_threshold: f64) -> Result<Workflow> {
        validate_threshold(confidence_threshold)?;
        let mut workflow = self.workflow(workflow_id)?;
        if workflow.status.is_terminal() {
            return Err(TabreconError::StageNotAllowed {
                stage: "change the threshold",
                status: workflow.status,
            });
        }
        workflow.confidence_threshold = confidence_threshold;
        Repository::<Workflow>::update(&mut self.store, workflow)
    }

    /// Apply an explicit state-machine transition
    pub fn transition(
        &mut self,
        workflow_id: Uuid,
        from: WorkflowStatus,
        to: WorkflowStatus,
    ) -> Result<Workflow> {
        let mut workflow = self.workflow(workflow_id)?;
        workflow::transition(&mut workflow, from, to)?;
        log::info!("Workflow '{}' is now {}", workflow.name, workflow.status);
        Repository::<Workflow>::update(&mut self.store, workflow)
    }

    pub fn fail(&mut self, workflow_id: Uuid) -> Result<Workflow> {
        let mut workflow = self.workflow(workflow_id)?;
        workflow::fail(&mut workflow)?;
        log::info!("Workflow '{}' marked failed", workflow.name);
        Repository::<Workflow>::update(&mut self.store, workflow)
    }

    pub fn complete(&mut self, workflow_id: Uuid) -> Result<Workflow> {
        self.transition(
            workflow_id,
            WorkflowStatus::ResultsReviewed,
            WorkflowStatus::Completed,
        )
    }

    /// Delete a workflow together with every record it owns
    pub fn delete_workflow(&mut self, workflow_id: Uuid) -> Result<Workflow> {
        let workflow = self.workflow(workflow_id)?;

        let matches = Repository::<RowMatch>::list_by_workflow(&self.store, workflow_id)?;
        for m in &matches {
            Repository::<RowMatch>::delete(&mut self.store, m.id)?;
        }
        let mappings = Repository::<ColumnMapping>::list_by_workflow(&self.store, workflow_id)?;
        for m in &mappings {
            Repository::<ColumnMapping>::delete(&mut self.store, m.id)?;
        }
        let rows = Repository::<RowRecord>::list_by_workflow(&self.store, workflow_id)?;
        for r in &rows {
            Repository::<RowRecord>::delete(&mut self.store, r.id)?;
        }
        for f in self.files(workflow_id)? {
            Repository::<DatasetFile>::delete(&mut self.store, f.id)?;
        }
        let workflow = Repository::<Workflow>::delete(&mut self.store, workflow.id)?;

        log::info!(
            "Deleted workflow '{}' with {} row(s), {} mapping(s), {} match(es)",
            workflow.name,
            rows.len(),
            mappings.len(),
            matches.len()
        );
        Ok(workflow)
    }

    // Files

    /// Attach a parsed dataset as the workflow's base or updated file.
    ///
    /// A second upload for the same role replaces the first. Once both roles
    /// are present the workflow moves to `files_uploaded`.
    pub fn attach_file(
        &mut self,
        workflow_id: Uuid,
        role: FileRole,
        dataset: LoadedDataset,
    ) -> Result<DatasetFile> {
        let mut workflow = self.workflow(workflow_id)?;
        require_stage(&workflow, "attach files", &[WorkflowStatus::Created])?;

        if dataset.columns.is_empty() {
            return Err(TabreconError::invalid_input(format!(
                "{} has no columns",
                dataset.filename
            )));
        }

        if let Some(previous) = self.file(workflow_id, role)? {
            log::info!("Replacing {} file {}", role, previous.filename);
            for row in self.rows(workflow_id, previous.id)? {
                Repository::<RowRecord>::delete(&mut self.store, row.id)?;
            }
            Repository::<DatasetFile>::delete(&mut self.store, previous.id)?;
        }

        let file = DatasetFile::new(
            workflow_id,
            role,
            dataset.filename,
            dataset.size,
            dataset.columns,
        );
        let file = Repository::<DatasetFile>::create(&mut self.store, file)?;
        let row_count = dataset.rows.len();
        for (i, data) in dataset.rows.into_iter().enumerate() {
            let row = RowRecord::new(workflow_id, file.id, i as u64, data);
            Repository::<RowRecord>::create(&mut self.store, row)?;
        }
        log::info!(
            "Attached {} file {} ({} columns, {} rows)",
            role,
            file.filename,
            file.columns.len(),
            row_count
        );

        let other = match role {
            FileRole::Base => FileRole::Updated,
            FileRole::Updated => FileRole::Base,
        };
        if self.file(workflow_id, other)?.is_some() {
            workflow::transition(
                &mut workflow,
                WorkflowStatus::Created,
                WorkflowStatus::FilesUploaded,
            )?;
            Repository::<Workflow>::update(&mut self.store, workflow)?;
        }

        Ok(file)
    }

    // Columns

    /// Propose column mappings from name similarity and move to `columns_mapped`
    pub fn align_columns(&mut self, workflow_id: Uuid) -> Result<ColumnAlignment> {
        let mut workflow = self.workflow(workflow_id)?;
        require_stage(&workflow, "align columns", &[WorkflowStatus::FilesUploaded])?;
        let (base, updated) = self.file_pair(workflow_id)?;

        let alignment = self
            .config
            .column_resolver()
            .resolve(&base.columns, &updated.columns);

        for stale in Repository::<ColumnMapping>::list_by_workflow(&self.store, workflow_id)? {
            Repository::<ColumnMapping>::delete(&mut self.store, stale.id)?;
        }
        for mapping in alignment.to_mappings(workflow_id) {
            Repository::<ColumnMapping>::create(&mut self.store, mapping)?;
        }

        workflow::transition(
            &mut workflow,
            WorkflowStatus::FilesUploaded,
            WorkflowStatus::ColumnsMapped,
        )?;
        Repository::<Workflow>::update(&mut self.store, workflow)?;

        log::info!(
            "Proposed {} column mapping(s); {} base column(s) need manual mapping",
            alignment.proposals.len(),
            alignment.unmatched_base.len()
        );
        Ok(alignment)
    }

    /// Pair a base column with an updated column by hand.
    ///
    /// Inactive mappings that share either column are replaced. An active
    /// mapping on either column is a `DuplicateColumnAssignment`.
    pub fn map_columns(
        &mut self,
        workflow_id: Uuid,
        base_column: &str,
        updated_column: &str,
    ) -> Result<ColumnMapping> {
        let workflow = self.workflow(workflow_id)?;
        require_stage(&workflow, "edit column mappings", MAPPING_STAGES)?;
        let (base, updated) = self.file_pair(workflow_id)?;

        require_column(&base, base_column)?;
        require_column(&updated, updated_column)?;

        let existing = Repository::<ColumnMapping>::list_by_workflow(&self.store, workflow_id)?;
        if let Some(same) = existing
            .iter()
            .find(|m| m.base_column == base_column && m.updated_column == updated_column)
        {
            return self.set_column_match(workflow_id, same.id, true);
        }

        let (replaced, kept): (Vec<ColumnMapping>, Vec<ColumnMapping>) =
            existing.into_iter().partition(|m| {
                !m.is_match && (m.base_column == base_column || m.updated_column == updated_column)
            });

        let score = self
            .config
            .column_resolver()
            .name_similarity(base_column, updated_column);
        let mapping = ColumnMapping::new(workflow_id, base_column, updated_column, score, true);

        let mut candidate = kept;
        candidate.push(mapping.clone());
        validate_mappings(&candidate)?;

        for old in replaced {
            Repository::<ColumnMapping>::delete(&mut self.store, old.id)?;
        }
        let mapping = Repository::<ColumnMapping>::create(&mut self.store, mapping)?;
        log::info!("Mapped column {} -> {}", base_column, updated_column);
        Ok(mapping)
    }

    /// Accept or exclude a mapping from row matching
    pub fn set_column_match(
        &mut self,
        workflow_id: Uuid,
        mapping_id: Uuid,
        is_match: bool,
    ) -> Result<ColumnMapping> {
        let workflow = self.workflow(workflow_id)?;
        require_stage(&workflow, "edit column mappings", MAPPING_STAGES)?;

        let mut mapping = Repository::<ColumnMapping>::get(&self.store, mapping_id)?;
        if mapping.workflow_id != workflow_id {
            return Err(TabreconError::not_found("ColumnMapping", mapping_id));
        }
        mapping.is_match = is_match;
        log::debug!(
            "Column mapping {} -> {} match={}",
            mapping.base_column,
            mapping.updated_column,
            is_match
        );
        Repository::<ColumnMapping>::update(&mut self.store, mapping)
    }

    pub fn submit_column_review(&mut self, workflow_id: Uuid) -> Result<Workflow> {
        self.transition(
            workflow_id,
            WorkflowStatus::ColumnsMapped,
            WorkflowStatus::MappedColumnsReviewed,
        )
    }

    // Rows

    pub fn match_rows(&mut self, workflow_id: Uuid) -> Result<MatchRun> {
        self.match_rows_with_progress(workflow_id, None)
    }

    /// Run the matching engine and store its proposals as pending matches.
    ///
    /// Pending matches from an earlier run are replaced. Rows in a confirmed
    /// match are left out, and rejected pairs are never proposed again.
    pub fn match_rows_with_progress(
        &mut self,
        workflow_id: Uuid,
        progress: Option<&(dyn Fn(u64, u64) + Sync)>,
    ) -> Result<MatchRun> {
        let workflow = self.workflow(workflow_id)?;
        require_stage(&workflow, "match rows", &[WorkflowStatus::MappedColumnsReviewed])?;
        let (base, updated) = self.file_pair(workflow_id)?;

        let mappings = Repository::<ColumnMapping>::list_by_workflow(&self.store, workflow_id)?;
        if !mappings.iter().any(|m| m.is_match) {
            return Err(TabreconError::NoMappingAvailable { workflow_id });
        }

        let existing = Repository::<RowMatch>::list_by_workflow(&self.store, workflow_id)?;
        let mut claimed = HashSet::new();
        let mut blocked = Vec::new();
        let mut stale = Vec::new();
        for m in existing {
            match m.review_state() {
                ReviewState::Confirmed => {
                    claimed.insert(m.base_row_id);
                    claimed.insert(m.updated_row_id);
                }
                ReviewState::Rejected => blocked.push((m.base_row_id, m.updated_row_id)),
                ReviewState::Pending => stale.push(m.id),
            }
        }
        let kept_confirmed = claimed.len() / 2;

        let base_rows: Vec<RowRecord> = self
            .rows(workflow_id, base.id)?
            .into_iter()
            .filter(|r| !claimed.contains(&r.id))
            .collect();
        let updated_rows: Vec<RowRecord> = self
            .rows(workflow_id, updated.id)?
            .into_iter()
            .filter(|r| !claimed.contains(&r.id))
            .collect();

        let matcher = RowMatcher::new(self.config.match_config(workflow.confidence_threshold))
            .with_blocked(blocked);
        let outcome =
            matcher.match_rows_with_progress(&mappings, &base_rows, &updated_rows, progress)?;

        for id in &stale {
            Repository::<RowMatch>::delete(&mut self.store, *id)?;
        }

        let mut created = Vec::with_capacity(outcome.matches.len());
        for proposal in &outcome.matches {
            let base_row = base_rows
                .iter()
                .find(|r| r.id == proposal.base_row_id)
                .ok_or_else(|| TabreconError::not_found("RowRecord", proposal.base_row_id))?;
            let updated_row = updated_rows
                .iter()
                .find(|r| r.id == proposal.updated_row_id)
                .ok_or_else(|| TabreconError::not_found("RowRecord", proposal.updated_row_id))?;
            let row_match = RowMatch::new(
                workflow_id,
                base_row,
                updated_row,
                proposal.confirmations.clone(),
            );
            created.push(Repository::<RowMatch>::create(&mut self.store, row_match)?);
        }

        log::info!(
            "Stored {} pending match(es) for '{}' ({} discarded, {} confirmed kept)",
            created.len(),
            workflow.name,
            stale.len(),
            kept_confirmed
        );

        Ok(MatchRun {
            created,
            discarded: stale.len(),
            kept_confirmed,
            outcome,
        })
    }

    /// Confirm a match. A previously rejected match must not collide with
    /// another active match on either row.
    pub fn confirm_match(&mut self, workflow_id: Uuid, match_id: Uuid) -> Result<RowMatch> {
        let workflow = self.workflow(workflow_id)?;
        require_stage(&workflow, "review matches", REVIEW_STAGES)?;
        let mut row_match = self.owned_match(workflow_id, match_id)?;

        if row_match.is_rejected() {
            let others = Repository::<RowMatch>::list_by_workflow(&self.store, workflow_id)?;
            for other in others.iter().filter(|o| o.id != match_id && !o.is_rejected()) {
                if other.base_row_id == row_match.base_row_id {
                    return Err(TabreconError::DuplicateRowAssignment {
                        row_id: row_match.base_row_id,
                    });
                }
                if other.updated_row_id == row_match.updated_row_id {
                    return Err(TabreconError::DuplicateRowAssignment {
                        row_id: row_match.updated_row_id,
                    });
                }
            }
        }

        row_match.mark_confirmed(Utc::now());
        log::debug!("Confirmed match {}", match_id);
        Repository::<RowMatch>::update(&mut self.store, row_match)
    }

    pub fn reject_match(&mut self, workflow_id: Uuid, match_id: Uuid) -> Result<RowMatch> {
        let workflow = self.workflow(workflow_id)?;
        require_stage(&workflow, "review matches", REVIEW_STAGES)?;
        let mut row_match = self.owned_match(workflow_id, match_id)?;
        row_match.mark_rejected(Utc::now());
        log::debug!("Rejected match {}", match_id);
        Repository::<RowMatch>::update(&mut self.store, row_match)
    }

    /// Confirm every pending match at or above the workflow's threshold
    pub fn confirm_eligible(&mut self, workflow_id: Uuid) -> Result<Vec<RowMatch>> {
        let workflow = self.workflow(workflow_id)?;
        require_stage(&workflow, "review matches", REVIEW_STAGES)?;

        let now = Utc::now();
        let mut confirmed = Vec::new();
        for mut row_match in Repository::<RowMatch>::list_by_workflow(&self.store, workflow_id)? {
            if row_match.is_pending() && row_match.confidence() >= workflow.confidence_threshold {
                row_match.mark_confirmed(now);
                confirmed.push(Repository::<RowMatch>::update(&mut self.store, row_match)?);
            }
        }
        log::info!(
            "Confirmed {} match(es) at or above {:.2}",
            confirmed.len(),
            workflow.confidence_threshold
        );
        Ok(confirmed)
    }

    pub fn submit_results_review(&mut self, workflow_id: Uuid) -> Result<Workflow> {
        self.transition(
            workflow_id,
            WorkflowStatus::MappedColumnsReviewed,
            WorkflowStatus::ResultsReviewed,
        )
    }

    fn owned_match(&self, workflow_id: Uuid, match_id: Uuid) -> Result<RowMatch> {
        let row_match = Repository::<RowMatch>::get(&self.store, match_id)?;
        if row_match.workflow_id != workflow_id {
            return Err(TabreconError::not_found("RowMatch", match_id));
        }
        Ok(row_match)
    }

    fn file_pair(&self, workflow_id: Uuid) -> Result<(DatasetFile, DatasetFile)> {
        let files = self.files(workflow_id)?;
        let pick = |role: FileRole| {
            files.iter().find(|f| f.role == role).cloned().ok_or_else(|| {
                TabreconError::invalid_input(format!("Workflow {} has no {} file", workflow_id, role))
            })
        };
        Ok((pick(FileRole::Base)?, pick(FileRole::Updated)?))
    }
}

fn require_stage(
    workflow: &Workflow,
    stage: &'static str,
    allowed: &[WorkflowStatus],
) -> Result<()> {
    if allowed.contains(&workflow.status) {
        Ok(())
    } else {
        Err(TabreconError::StageNotAllowed {
            stage,
            status: workflow.status,
        })
    }
}

fn require_column(file: &DatasetFile, column: &str) -> Result<()> {
    if file.columns.iter().any(|c| c == column) {
        Ok(())
    } else {
        Err(TabreconError::invalid_input(format!(
            "Column '{}' does not exist in {} file {}",
            column, file.role, file.filename
        )))
    }
}
