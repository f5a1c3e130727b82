//! Command implementations for tabrecon CLI

use crate::cli::{parse_column_state, Commands, ExportFormat, MatchFilter, OutputFormat};
use crate::error::{Result, TabreconError};
use crate::ingest::LoadedDataset;
use crate::model::{FileRole, ReviewState, RowData, Workflow};
use crate::output::{short_id, JsonFormatter, PrettyPrinter};
use crate::progress::ProgressReporter;
use crate::reconcile::Reconciler;
use crate::resolver::{resolve_id_prefix, WorkflowRef, WorkflowResolver};
use crate::store::MemoryStore;
use crate::workspace::TabreconWorkspace;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Execute a command
pub fn execute_command(command: Commands, workspace_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Init { force } => init_command(workspace_path, force),
        Commands::Create {
            name,
            description,
            threshold,
        } => create_command(workspace_path, &name, &description, threshold),
        Commands::List { format } => list_command(workspace_path, &format),
        Commands::Show { workflow, format } => {
            show_command(workspace_path, workflow.as_deref(), &format)
        }
        Commands::Upload {
            workflow,
            base,
            updated,
        } => upload_command(workspace_path, &workflow, base.as_deref(), updated.as_deref()),
        Commands::Align { workflow, format } => align_command(workspace_path, &workflow, &format),
        Commands::Map {
            workflow,
            base_column,
            updated_column,
        } => map_command(workspace_path, &workflow, &base_column, &updated_column),
        Commands::Column {
            workflow,
            base_column,
            state,
        } => column_command(workspace_path, &workflow, &base_column, &state),
        Commands::ReviewColumns { workflow } => review_columns_command(workspace_path, &workflow),
        Commands::Match {
            workflow,
            threshold,
            format,
        } => match_command(workspace_path, &workflow, threshold, &format),
        Commands::Matches {
            workflow,
            state,
            limit,
            format,
        } => matches_command(workspace_path, &workflow, &state, limit, &format),
        Commands::Confirm {
            workflow,
            match_ids,
            eligible,
        } => confirm_command(workspace_path, &workflow, &match_ids, eligible),
        Commands::Reject {
            workflow,
            match_ids,
        } => reject_command(workspace_path, &workflow, &match_ids),
        Commands::ReviewResults { workflow } => review_results_command(workspace_path, &workflow),
        Commands::Complete { workflow } => complete_command(workspace_path, &workflow),
        Commands::Fail { workflow } => fail_command(workspace_path, &workflow),
        Commands::Delete { workflow, force } => delete_command(workspace_path, &workflow, force),
        Commands::Export {
            workflow,
            output,
            format,
            all,
        } => export_command(workspace_path, &workflow, output.as_deref(), &format, all),
    }
}

/// Workspace plus the reconciler over its persisted store
struct Session {
    workspace: TabreconWorkspace,
    reconciler: Reconciler<MemoryStore>,
}

impl Session {
    fn open(workspace_path: Option<&Path>) -> Result<Self> {
        let workspace = TabreconWorkspace::find_or_create(workspace_path)?;
        let config = workspace.load_config()?;
        let store = workspace.load_store()?;
        Ok(Self {
            workspace,
            reconciler: Reconciler::new(store, config),
        })
    }

    fn save(&self) -> Result<()> {
        self.workspace.save_store(self.reconciler.store())
    }

    fn resolve(&self, reference: &str) -> Result<Workflow> {
        let workflows = self.reconciler.workflows()?;
        let resolver = WorkflowResolver::new(&workflows);
        resolver
            .resolve(&WorkflowRef::from_string(reference))
            .cloned()
    }

    /// Paths are taken relative to the workspace root unless absolute
    fn input_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.root.join(path)
        }
    }

    fn match_ids(&self, workflow_id: Uuid, tokens: &[String]) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = self
            .reconciler
            .matches(workflow_id)?
            .iter()
            .map(|m| m.id)
            .collect();
        tokens
            .iter()
            .map(|token| resolve_id_prefix(&ids, token, "RowMatch"))
            .collect()
    }
}

fn parse_output_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::parse(format).map_err(TabreconError::invalid_input)
}

/// Initialize tabrecon workspace
fn init_command(workspace_path: Option<&Path>, force: bool) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let root = workspace_path.unwrap_or(&current_dir);

    // init never adopts a workspace from a parent directory
    let workspace = TabreconWorkspace::create_new(root.to_path_buf())?;
    if force {
        workspace.create_config_with_force(true)?;
    }

    println!("✅ Initialized tabrecon workspace at: {}", workspace.root.display());
    println!("📁 Workspace directory: {}", workspace.tabrecon_dir.display());

    Ok(())
}

fn create_command(
    workspace_path: Option<&Path>,
    name: &str,
    description: &str,
    threshold: Option<f64>,
) -> Result<()> {
    let mut session = Session::open(workspace_path)?;
    let workflow = session
        .reconciler
        .create_workflow(name, description, threshold)?;
    session.save()?;

    println!(
        "✅ Created workflow '{}' ({}) with threshold {:.2}",
        workflow.name, workflow.id, workflow.confidence_threshold
    );
    println!("💡 Next: tabrecon upload {} --base <file> --updated <file>", workflow.name);
    Ok(())
}

fn list_command(workspace_path: Option<&Path>, format: &str) -> Result<()> {
    let output_format = parse_output_format(format)?;
    let session = Session::open(workspace_path)?;
    let workflows = session.reconciler.workflows()?;

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_workflow_list(&workflows),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&workflows)?),
    }
    Ok(())
}

fn show_command(workspace_path: Option<&Path>, workflow: Option<&str>, format: &str) -> Result<()> {
    let output_format = parse_output_format(format)?;
    let session = Session::open(workspace_path)?;

    let workflows = session.reconciler.workflows()?;
    let reference = workflow.map(WorkflowRef::from_string);
    let target = WorkflowResolver::new(&workflows).resolve_or_latest(reference.as_ref())?;
    let summary = session.reconciler.summary(target.id)?;

    match output_format {
        OutputFormat::Pretty => {
            PrettyPrinter::print_summary(&summary);
            let mappings = session.reconciler.mappings(target.id)?;
            if !mappings.is_empty() {
                PrettyPrinter::print_mappings(&mappings);
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::format(&summary)?),
    }
    Ok(())
}

fn upload_command(
    workspace_path: Option<&Path>,
    workflow: &str,
    base: Option<&Path>,
    updated: Option<&Path>,
) -> Result<()> {
    if base.is_none() && updated.is_none() {
        return Err(TabreconError::invalid_input(
            "Nothing to upload: pass --base and/or --updated",
        ));
    }

    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    for (role, path) in [(FileRole::Base, base), (FileRole::Updated, updated)] {
        let Some(path) = path else { continue };
        let path = session.input_path(path);
        let display_name = path.display().to_string();

        let mut progress = ProgressReporter::new_for_loading(&display_name);
        let dataset = LoadedDataset::load(&path)?;
        progress.finish(&format!("Loaded {}", dataset.filename));

        let rows = dataset.rows.len();
        let file = session.reconciler.attach_file(target.id, role, dataset)?;
        println!(
            "📄 Attached {} file {} ({} columns, {} rows)",
            role,
            file.filename,
            file.columns.len(),
            rows
        );
    }
    session.save()?;

    let status = session.reconciler.workflow(target.id)?.status;
    println!("🔗 Workflow '{}' is {}", target.name, status);
    Ok(())
}

fn align_command(workspace_path: Option<&Path>, workflow: &str, format: &str) -> Result<()> {
    let output_format = parse_output_format(format)?;
    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    let alignment = session.reconciler.align_columns(target.id)?;
    session.save()?;

    match output_format {
        OutputFormat::Pretty => {
            PrettyPrinter::print_alignment(&alignment);
            if !alignment.unmatched_base.is_empty() {
                println!(
                    "💡 Map remaining columns with: tabrecon map {} <base_column> <updated_column>",
                    target.name
                );
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::format(&alignment)?),
    }
    Ok(())
}

fn map_command(
    workspace_path: Option<&Path>,
    workflow: &str,
    base_column: &str,
    updated_column: &str,
) -> Result<()> {
    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    let mapping = session
        .reconciler
        .map_columns(target.id, base_column, updated_column)?;
    session.save()?;

    println!(
        "✅ Mapped {} → {} ({:.3})",
        mapping.base_column, mapping.updated_column, mapping.score
    );
    Ok(())
}

fn column_command(
    workspace_path: Option<&Path>,
    workflow: &str,
    base_column: &str,
    state: &str,
) -> Result<()> {
    let is_match = parse_column_state(state).map_err(TabreconError::invalid_input)?;
    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    let mapping = session
        .reconciler
        .mappings(target.id)?
        .into_iter()
        .find(|m| m.base_column == base_column)
        .ok_or_else(|| {
            TabreconError::invalid_input(format!(
                "Base column '{}' has no mapping in workflow '{}'",
                base_column, target.name
            ))
        })?;
    let mapping = session
        .reconciler
        .set_column_match(target.id, mapping.id, is_match)?;
    session.save()?;

    let verb = if mapping.is_match { "will be" } else { "will not be" };
    println!(
        "✅ {} → {} {} used for row matching",
        mapping.base_column, mapping.updated_column, verb
    );
    Ok(())
}

fn review_columns_command(workspace_path: Option<&Path>, workflow: &str) -> Result<()> {
    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    let reviewed = session.reconciler.submit_column_review(target.id)?;
    session.save()?;

    println!("✅ Column mapping accepted; workflow '{}' is {}", reviewed.name, reviewed.status);
    println!("💡 Next: tabrecon match {}", reviewed.name);
    Ok(())
}

fn match_command(
    workspace_path: Option<&Path>,
    workflow: &str,
    threshold: Option<f64>,
    format: &str,
) -> Result<()> {
    let output_format = parse_output_format(format)?;
    let mut session = Session::open(workspace_path)?;
    let mut target = session.resolve(workflow)?;

    if let Some(threshold) = threshold {
        target = session.reconciler.set_threshold(target.id, threshold)?;
    }

    let mut progress = match output_format {
        OutputFormat::Pretty => ProgressReporter::new_for_matching(0),
        OutputFormat::Json => ProgressReporter::new_minimal(),
    };
    let run = {
        let reporter = &progress;
        let report = move |done: u64, total: u64| reporter.update(done, total);
        session
            .reconciler
            .match_rows_with_progress(target.id, Some(&report))?
    };
    progress.finish("Scoring complete");
    session.save()?;

    match output_format {
        OutputFormat::Pretty => {
            PrettyPrinter::print_match_run(&run, target.confidence_threshold);
            println!("💡 Review with: tabrecon matches {} --state pending", target.name);
        }
        OutputFormat::Json => println!("{}", JsonFormatter::format(&run)?),
    }
    Ok(())
}

fn matches_command(
    workspace_path: Option<&Path>,
    workflow: &str,
    state: &str,
    limit: Option<usize>,
    format: &str,
) -> Result<()> {
    let output_format = parse_output_format(format)?;
    let filter = MatchFilter::parse(state).map_err(TabreconError::invalid_input)?;
    let session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    let details: Vec<_> = session
        .reconciler
        .match_details(target.id)?
        .into_iter()
        .filter(|d| filter.accepts(d.state))
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_matches(&details, target.confidence_threshold),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&details)?),
    }
    Ok(())
}

fn confirm_command(
    workspace_path: Option<&Path>,
    workflow: &str,
    match_ids: &[String],
    eligible: bool,
) -> Result<()> {
    if match_ids.is_empty() && !eligible {
        return Err(TabreconError::invalid_input(
            "Nothing to confirm: pass match ids or --eligible",
        ));
    }

    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;
    let ids = session.match_ids(target.id, match_ids)?;

    let mut confirmed = 0;
    for id in ids {
        session.reconciler.confirm_match(target.id, id)?;
        println!("✅ Confirmed {}", short_id(&id.to_string()));
        confirmed += 1;
    }
    if eligible {
        confirmed += session.reconciler.confirm_eligible(target.id)?.len();
    }
    session.save()?;

    println!("✅ {} match(es) confirmed in '{}'", confirmed, target.name);
    Ok(())
}

fn reject_command(workspace_path: Option<&Path>, workflow: &str, match_ids: &[String]) -> Result<()> {
    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;
    let ids = session.match_ids(target.id, match_ids)?;

    for id in &ids {
        session.reconciler.reject_match(target.id, *id)?;
        println!("❌ Rejected {}", short_id(&id.to_string()));
    }
    session.save()?;

    println!("✅ {} match(es) rejected in '{}'", ids.len(), target.name);
    Ok(())
}

fn review_results_command(workspace_path: Option<&Path>, workflow: &str) -> Result<()> {
    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    let reviewed = session.reconciler.submit_results_review(target.id)?;
    session.save()?;

    println!("✅ Match review submitted; workflow '{}' is {}", reviewed.name, reviewed.status);
    Ok(())
}

fn complete_command(workspace_path: Option<&Path>, workflow: &str) -> Result<()> {
    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    let completed = session.reconciler.complete(target.id)?;
    session.save()?;

    println!("🎉 Workflow '{}' completed", completed.name);
    Ok(())
}

fn fail_command(workspace_path: Option<&Path>, workflow: &str) -> Result<()> {
    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    let failed = session.reconciler.fail(target.id)?;
    session.save()?;

    println!("🛑 Workflow '{}' marked {}", failed.name, failed.status);
    Ok(())
}

fn delete_command(workspace_path: Option<&Path>, workflow: &str, force: bool) -> Result<()> {
    let mut session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    if !force {
        return Err(TabreconError::invalid_input(format!(
            "Refusing to delete workflow '{}' without --force",
            target.name
        )));
    }

    let deleted = session.reconciler.delete_workflow(target.id)?;
    session.save()?;

    println!("🗑️  Deleted workflow '{}' ({})", deleted.name, deleted.id);
    Ok(())
}

/// One exported match with the full mapped row values
#[derive(Debug, Serialize)]
struct ExportRecord {
    match_id: Uuid,
    state: ReviewState,
    confidence: f64,
    base_row: u64,
    updated_row: u64,
    base: RowData,
    updated: RowData,
}

fn export_command(
    workspace_path: Option<&Path>,
    workflow: &str,
    output: Option<&Path>,
    format: &str,
    all: bool,
) -> Result<()> {
    let export_format = ExportFormat::parse(format).map_err(TabreconError::invalid_input)?;
    let session = Session::open(workspace_path)?;
    let target = session.resolve(workflow)?;

    let mappings: Vec<_> = session
        .reconciler
        .mappings(target.id)?
        .into_iter()
        .filter(|m| m.is_match)
        .collect();

    let mut records = Vec::new();
    for m in session.reconciler.matches(target.id)? {
        let state = m.review_state();
        let wanted = match state {
            ReviewState::Confirmed => true,
            ReviewState::Pending => all,
            ReviewState::Rejected => false,
        };
        if !wanted {
            continue;
        }
        let base = session.reconciler.row(m.base_row_id)?;
        let updated = session.reconciler.row(m.updated_row_id)?;
        let pick = |data: &RowData, columns: Vec<&str>| -> RowData {
            columns
                .into_iter()
                .filter_map(|c| data.get(c).map(|v| (c.to_string(), v.clone())))
                .collect()
        };
        records.push(ExportRecord {
            match_id: m.id,
            state,
            confidence: m.confidence(),
            base_row: base.row,
            updated_row: updated.row,
            base: pick(&base.data, mappings.iter().map(|m| m.base_column.as_str()).collect()),
            updated: pick(
                &updated.data,
                mappings.iter().map(|m| m.updated_column.as_str()).collect(),
            ),
        });
    }

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            fs::create_dir_all(&session.workspace.exports_dir)?;
            session
                .workspace
                .export_path(&target.name, export_format.extension())
        }
    };

    match export_format {
        ExportFormat::Json => fs::write(&path, JsonFormatter::format(&records)?)?,
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_path(&path)?;
            let mut header = vec![
                "match_id".to_string(),
                "state".to_string(),
                "confidence".to_string(),
                "base_row".to_string(),
                "updated_row".to_string(),
            ];
            for mapping in &mappings {
                header.push(format!("base.{}", mapping.base_column));
                header.push(format!("updated.{}", mapping.updated_column));
            }
            writer.write_record(&header)?;

            for record in &records {
                let mut line = vec![
                    record.match_id.to_string(),
                    record.state.to_string(),
                    format!("{:.4}", record.confidence),
                    record.base_row.to_string(),
                    record.updated_row.to_string(),
                ];
                for mapping in &mappings {
                    let cell = |data: &RowData, column: &str| {
                        data.get(column).map(|v| v.to_string()).unwrap_or_default()
                    };
                    line.push(cell(&record.base, &mapping.base_column));
                    line.push(cell(&record.updated, &mapping.updated_column));
                }
                writer.write_record(&line)?;
            }
            writer.flush()?;
        }
    }

    println!("📦 Exported {} match(es) to {}", records.len(), path.display());
    Ok(())
}
