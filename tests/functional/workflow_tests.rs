//! End-to-end workflow tests driven through the CLI

use crate::common::{sample_data, CliTestRunner};
use std::collections::HashSet;
use tabrecon::model::FileRole;
use tabrecon::{TabreconError, WorkflowStatus};

#[test]
fn test_complete_reconciliation_workflow() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();

    runner.prepare_reviewed_workflow("people");
    assert_eq!(
        fixture.workflow("people").unwrap().status,
        WorkflowStatus::MappedColumnsReviewed
    );

    runner.expect_success(&["match", "people"]);
    runner.expect_success(&["confirm", "people", "--eligible"]);
    runner.expect_success(&["review-results", "people"]);
    runner.expect_success(&["complete", "people"]);

    let rec = fixture.reconciler().unwrap();
    let wf = fixture.workflow("people").unwrap();
    assert_eq!(wf.status, WorkflowStatus::Completed);

    let summary = rec.summary(wf.id).unwrap();
    assert_eq!(summary.confirmed, 2);
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.unmatched_base, 0);
    assert_eq!(summary.unmatched_updated, 0);
}

#[test]
fn test_swapped_rows_are_paired_by_content() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people"]);

    let fixture = runner.fixture();
    let rec = fixture.reconciler().unwrap();
    let wf = fixture.workflow("people").unwrap();

    let pairs: HashSet<(u64, u64)> = rec
        .match_details(wf.id)
        .unwrap()
        .iter()
        .map(|d| (d.base_row, d.updated_row))
        .collect();
    let base = rec.file(wf.id, FileRole::Base).unwrap().unwrap();
    let updated = rec.file(wf.id, FileRole::Updated).unwrap().unwrap();
    let base_rows = rec.rows(wf.id, base.id).unwrap();
    let updated_rows = rec.rows(wf.id, updated.id).unwrap();

    // Alice is first in base and second in updated, Bob the reverse
    assert!(pairs.contains(&(base_rows[0].row, updated_rows[1].row)));
    assert!(pairs.contains(&(base_rows[1].row, updated_rows[0].row)));
}

#[test]
fn test_upload_in_two_steps() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let (base, updated) = fixture.create_people_files().unwrap();

    runner.expect_success(&["create", "people", "--threshold", "0.9"]);
    runner.expect_success(&["upload", "people", "--base", base.to_str().unwrap()]);
    assert_eq!(fixture.workflow("people").unwrap().status, WorkflowStatus::Created);

    runner.expect_success(&["upload", "people", "--updated", updated.to_str().unwrap()]);
    let wf = fixture.workflow("people").unwrap();
    assert_eq!(wf.status, WorkflowStatus::FilesUploaded);
    assert_eq!(wf.confidence_threshold, 0.9);

    let rec = fixture.reconciler().unwrap();
    let files = rec.files(wf.id).unwrap();
    assert_eq!(files.len(), 2);
}

#[test]
fn test_upload_without_files_fails() {
    let runner = CliTestRunner::new().unwrap();
    runner.expect_success(&["create", "people"]);
    let err = runner.expect_failure(&["upload", "people"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));
}

#[test]
fn test_relative_upload_paths_resolve_against_workspace_root() {
    let runner = CliTestRunner::new().unwrap();
    runner.fixture().create_people_files().unwrap();

    runner.expect_success(&["create", "people"]);
    runner.expect_success(&["upload", "people", "--base", "base.csv", "--updated", "updated.csv"]);
    assert_eq!(
        runner.fixture().workflow("people").unwrap().status,
        WorkflowStatus::FilesUploaded
    );
}

#[test]
fn test_alignment_proposes_renamed_columns() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");

    let fixture = runner.fixture();
    let rec = fixture.reconciler().unwrap();
    let wf = fixture.workflow("people").unwrap();
    let pairs: Vec<(String, String)> = rec
        .mappings(wf.id)
        .unwrap()
        .into_iter()
        .map(|m| (m.base_column, m.updated_column))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("Name".to_string(), "full_name".to_string()),
            ("Email".to_string(), "email_address".to_string()),
        ]
    );
}

#[test]
fn test_dropped_row_stays_unmatched() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let base = fixture
        .create_csv("products.csv", &sample_data::products_base())
        .unwrap();
    let updated = fixture
        .create_csv("products_v2.csv", &sample_data::products_updated())
        .unwrap();

    runner.expect_success(&["create", "products", "--threshold", "0.7"]);
    runner.expect_success(&[
        "upload",
        "products",
        "--base",
        base.to_str().unwrap(),
        "--updated",
        updated.to_str().unwrap(),
    ]);
    runner.expect_success(&["align", "products", "--format", "json"]);
    runner.expect_success(&["review-columns", "products"]);
    runner.expect_success(&["match", "products", "--format", "json"]);

    let rec = fixture.reconciler().unwrap();
    let wf = fixture.workflow("products").unwrap();
    let summary = rec.summary(wf.id).unwrap();
    assert_eq!(summary.active_mappings, 3);
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.unmatched_base, 1);
    assert_eq!(summary.unmatched_updated, 0);
}

#[test]
fn test_listing_and_show_commands() {
    let runner = CliTestRunner::new().unwrap();
    runner.expect_success(&["list"]);
    let err = runner.expect_failure(&["show"]);
    assert!(matches!(err, TabreconError::Workspace(_)));

    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["list", "--format", "json"]);
    runner.expect_success(&["show"]);
    runner.expect_success(&["show", "people", "--format", "json"]);

    let err = runner.expect_failure(&["list", "--format", "yaml"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));
}

#[test]
fn test_workflow_by_id_prefix() {
    let runner = CliTestRunner::new().unwrap();
    runner.expect_success(&["create", "people"]);
    let id = runner.fixture().workflow("people").unwrap().id.to_string();

    runner.expect_success(&["show", &id[..8]]);
    runner.expect_success(&["show", &id]);
    let err = runner.expect_failure(&["show", "nobody"]);
    assert!(matches!(err, TabreconError::WorkflowNotFound { .. }));
}

#[test]
fn test_fail_then_delete() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people"]);

    runner.expect_success(&["fail", "people"]);
    assert_eq!(
        runner.fixture().workflow("people").unwrap().status,
        WorkflowStatus::Failed
    );
    let err = runner.expect_failure(&["match", "people"]);
    assert!(matches!(err, TabreconError::StageNotAllowed { .. }));

    let err = runner.expect_failure(&["delete", "people"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));
    runner.expect_success(&["delete", "people", "--force"]);

    let rec = runner.fixture().reconciler().unwrap();
    assert!(rec.workflows().unwrap().is_empty());
    assert_eq!(rec.store().matches.len(), 0);
    assert_eq!(rec.store().rows.len(), 0);
}
