//! Unit tests for CLI argument parsing

use clap::Parser;
use std::path::PathBuf;
use tabrecon::cli::{Cli, Commands, ExportFormat, MatchFilter, OutputFormat};
use tabrecon::model::ReviewState;

fn parse(args: &[&str]) -> Cli {
    let mut full = vec!["tabrecon"];
    full.extend(args);
    match Cli::try_parse_from(full) {
        Ok(cli) => cli,
        Err(e) => panic!("{:?} should parse: {}", args, e),
    }
}

fn rejects(args: &[&str]) -> bool {
    let mut full = vec!["tabrecon"];
    full.extend(args);
    Cli::try_parse_from(full).is_err()
}

#[test]
fn test_init_command_parsing() {
    let cli = parse(&["init"]);
    assert!(matches!(cli.command, Commands::Init { force: false }));

    let cli = parse(&["init", "--force"]);
    assert!(matches!(cli.command, Commands::Init { force: true }));
}

#[test]
fn test_global_flags_anywhere() {
    let cli = parse(&["--workspace", "/tmp/ws", "list", "--verbose"]);
    assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
    assert!(cli.verbose);

    let cli = parse(&["show", "-v", "--workspace", "data"]);
    assert_eq!(cli.workspace, Some(PathBuf::from("data")));
    assert!(cli.verbose);
}

#[test]
fn test_create_command_parsing() {
    let cli = parse(&["create", "customers", "--description", "Q3 export", "--threshold", "0.65"]);
    match cli.command {
        Commands::Create {
            name,
            description,
            threshold,
        } => {
            assert_eq!(name, "customers");
            assert_eq!(description, "Q3 export");
            assert_eq!(threshold, Some(0.65));
        }
        _ => panic!("expected create"),
    }

    let cli = parse(&["create", "customers"]);
    match cli.command {
        Commands::Create {
            description,
            threshold,
            ..
        } => {
            assert_eq!(description, "");
            assert_eq!(threshold, None);
        }
        _ => panic!("expected create"),
    }
}

#[test]
fn test_threshold_bounds_are_enforced_by_parser() {
    assert!(rejects(&["create", "w", "--threshold", "1.01"]));
    assert!(rejects(&["create", "w", "--threshold", "-0.2"]));
    assert!(rejects(&["match", "w", "--threshold", "abc"]));
    assert!(!rejects(&["match", "w", "--threshold", "0"]));
    assert!(!rejects(&["match", "w", "--threshold", "1"]));
}

#[test]
fn test_show_workflow_is_optional() {
    let cli = parse(&["show"]);
    assert!(matches!(cli.command, Commands::Show { workflow: None, .. }));

    let cli = parse(&["show", "customers", "--format", "json"]);
    match cli.command {
        Commands::Show { workflow, format } => {
            assert_eq!(workflow.as_deref(), Some("customers"));
            assert_eq!(format, "json");
        }
        _ => panic!("expected show"),
    }
}

#[test]
fn test_map_and_column_commands() {
    let cli = parse(&["map", "w", "Name", "full_name"]);
    match cli.command {
        Commands::Map {
            workflow,
            base_column,
            updated_column,
        } => {
            assert_eq!(workflow, "w");
            assert_eq!(base_column, "Name");
            assert_eq!(updated_column, "full_name");
        }
        _ => panic!("expected map"),
    }

    let cli = parse(&["column", "w", "Email", "ignore"]);
    assert!(matches!(cli.command, Commands::Column { ref state, .. } if state == "ignore"));

    assert!(rejects(&["map", "w", "Name"]));
}

#[test]
fn test_review_commands_use_kebab_case() {
    assert!(matches!(parse(&["review-columns", "w"]).command, Commands::ReviewColumns { .. }));
    assert!(matches!(parse(&["review-results", "w"]).command, Commands::ReviewResults { .. }));
    assert!(rejects(&["review_columns", "w"]));
}

#[test]
fn test_matches_defaults() {
    let cli = parse(&["matches", "w"]);
    match cli.command {
        Commands::Matches {
            state,
            limit,
            format,
            ..
        } => {
            assert_eq!(state, "all");
            assert_eq!(limit, None);
            assert_eq!(format, "pretty");
        }
        _ => panic!("expected matches"),
    }

    let cli = parse(&["matches", "w", "--state", "pending", "--limit", "5"]);
    assert!(matches!(cli.command, Commands::Matches { limit: Some(5), .. }));
}

#[test]
fn test_confirm_and_reject_ids() {
    let cli = parse(&["confirm", "w", "abcd1234", "ef567890"]);
    match cli.command {
        Commands::Confirm {
            match_ids,
            eligible,
            ..
        } => {
            assert_eq!(match_ids, vec!["abcd1234", "ef567890"]);
            assert!(!eligible);
        }
        _ => panic!("expected confirm"),
    }

    let cli = parse(&["confirm", "w", "--eligible"]);
    assert!(matches!(cli.command, Commands::Confirm { eligible: true, ref match_ids, .. } if match_ids.is_empty()));

    assert!(rejects(&["reject", "w"]));
    assert!(!rejects(&["reject", "w", "abcd"]));
}

#[test]
fn test_delete_and_export_flags() {
    assert!(matches!(parse(&["delete", "w"]).command, Commands::Delete { force: false, .. }));
    assert!(matches!(parse(&["delete", "w", "--force"]).command, Commands::Delete { force: true, .. }));

    let cli = parse(&["export", "w"]);
    match cli.command {
        Commands::Export {
            output,
            format,
            all,
            ..
        } => {
            assert_eq!(output, None);
            assert_eq!(format, "csv");
            assert!(!all);
        }
        _ => panic!("expected export"),
    }

    let cli = parse(&["export", "w", "--output", "out.json", "--format", "json", "--all"]);
    assert!(matches!(cli.command, Commands::Export { all: true, .. }));
}

#[test]
fn test_format_parsers() {
    assert_eq!(OutputFormat::parse("Pretty"), Ok(OutputFormat::Pretty));
    assert!(OutputFormat::parse("table").is_err());

    assert_eq!(ExportFormat::parse("JSON"), Ok(ExportFormat::Json));
    assert_eq!(ExportFormat::Csv.extension(), "csv");
    assert!(ExportFormat::parse("parquet").is_err());

    let rejected = MatchFilter::parse("rejected").unwrap();
    assert!(rejected.accepts(ReviewState::Rejected));
    assert!(!rejected.accepts(ReviewState::Pending));
}

#[test]
fn test_unknown_subcommand_fails() {
    assert!(rejects(&["frobnicate", "x"]));
    assert!(rejects(&[]));
}
