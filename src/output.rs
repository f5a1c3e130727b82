//! Output formatting utilities

use crate::columns::ColumnAlignment;
use crate::error::Result;
use crate::model::{ColumnMapping, ReviewState, Workflow};
use crate::reconcile::{MatchDetail, MatchRun, WorkflowSummary};

/// Pretty printer for tabrecon output
pub struct PrettyPrinter;

impl PrettyPrinter {
    pub fn print_workflow_list(workflows: &[Workflow]) {
        if workflows.is_empty() {
            println!("No workflows found.");
            return;
        }

        println!("📋 Workflows:");
        for (i, wf) in workflows.iter().enumerate() {
            let prefix = if i == workflows.len() - 1 { "└─" } else { "├─" };
            println!(
                "{} {} {} [{}] threshold {:.2}",
                prefix,
                short_id(&wf.id.to_string()),
                wf.name,
                wf.status,
                wf.confidence_threshold
            );
        }
    }

    pub fn print_summary(summary: &WorkflowSummary) {
        let wf = &summary.workflow;
        println!("🔗 Workflow: {} ({})", wf.name, wf.id);
        if !wf.description.is_empty() {
            println!("├─ Description: {}", wf.description);
        }
        println!("├─ Status: {}", wf.status);
        println!("├─ Threshold: {:.2}", wf.confidence_threshold);
        println!("├─ Updated: {}", wf.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        for file in &summary.files {
            println!(
                "├─ {} file: {} ({} columns, {})",
                file.role,
                file.filename,
                file.columns.len(),
                format_bytes(file.size)
            );
        }
        println!(
            "├─ Columns: {} mapped, {} used for matching",
            summary.mappings, summary.active_mappings
        );
        println!(
            "├─ Rows: {} base, {} updated",
            summary.base_rows, summary.updated_rows
        );
        println!(
            "├─ Matches: {} pending, {} confirmed, {} rejected",
            summary.pending, summary.confirmed, summary.rejected
        );
        println!(
            "└─ Unmatched: {} base, {} updated",
            summary.unmatched_base, summary.unmatched_updated
        );
    }

    pub fn print_alignment(alignment: &ColumnAlignment) {
        println!("🧭 Column alignment:");
        for proposal in &alignment.proposals {
            println!(
                "├─ ✅ {} → {} ({:.3})",
                proposal.base_column, proposal.updated_column, proposal.score
            );
        }
        if !alignment.unmatched_base.is_empty() {
            println!("├─ ❓ Unmatched base: {}", alignment.unmatched_base.join(", "));
        }
        if !alignment.unmatched_updated.is_empty() {
            println!(
                "├─ ❓ Unmatched updated: {}",
                alignment.unmatched_updated.join(", ")
            );
        }
        println!("└─ {} column pair(s) proposed", alignment.proposals.len());
    }

    pub fn print_mappings(mappings: &[ColumnMapping]) {
        println!("🧭 Column mappings:");
        for (i, mapping) in mappings.iter().enumerate() {
            let prefix = if i == mappings.len() - 1 { "└─" } else { "├─" };
            let marker = if mapping.is_match { "✅" } else { "🚫" };
            println!(
                "{} {} {} → {} ({:.3})",
                prefix, marker, mapping.base_column, mapping.updated_column, mapping.score
            );
        }
    }

    pub fn print_match_run(run: &MatchRun, threshold: f64) {
        let eligible = run
            .outcome
            .matches
            .iter()
            .filter(|m| m.eligible)
            .count();
        let stats = &run.outcome.stats;
        println!("🔍 Row matching");
        println!(
            "├─ Pairs scored: {} ({} pruned, {} without comparable fields)",
            stats.pairs_considered, stats.pairs_pruned, stats.pairs_unscorable
        );
        println!("├─ New pending matches: {}", run.created.len());
        println!("├─ At or above {:.2}: {}", threshold, eligible);
        if run.discarded > 0 {
            println!("├─ Previous pending matches replaced: {}", run.discarded);
        }
        if run.kept_confirmed > 0 {
            println!("├─ Confirmed matches kept: {}", run.kept_confirmed);
        }
        println!(
            "└─ Unmatched: {} base, {} updated",
            run.outcome.unmatched_base.len(),
            run.outcome.unmatched_updated.len()
        );
    }

    pub fn print_matches(details: &[MatchDetail], threshold: f64) {
        if details.is_empty() {
            println!("No matches found.");
            return;
        }

        for (i, detail) in details.iter().enumerate() {
            let last = i == details.len() - 1;
            let prefix = if last { "└─" } else { "├─" };
            let marker = match detail.state {
                ReviewState::Confirmed => "✅",
                ReviewState::Rejected => "❌",
                ReviewState::Pending if detail.confidence >= threshold => "🟢",
                ReviewState::Pending => "🟡",
            };
            println!(
                "{} {} {} base row {} ↔ updated row {} ({:.3}, {})",
                prefix,
                marker,
                short_id(&detail.id.to_string()),
                detail.base_row,
                detail.updated_row,
                detail.confidence,
                detail.state
            );
            let indent = if last { "   " } else { "│  " };
            for field in &detail.fields {
                println!(
                    "{}   {}: '{}' ↔ {}: '{}' ({:.3})",
                    indent,
                    field.base_column,
                    field.base_value,
                    field.updated_column,
                    field.updated_value,
                    field.confidence
                );
            }
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}

/// First 8 characters of an id, enough to type back as a reference
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
