//! Column and match review through the CLI

use crate::common::CliTestRunner;
use tabrecon::model::ReviewState;
use tabrecon::{TabreconError, WorkflowStatus};
use uuid::Uuid;

/// Ids of the workflow's matches, best first
fn match_ids(runner: &CliTestRunner, workflow: &str) -> Vec<Uuid> {
    let fixture = runner.fixture();
    let wf = fixture.workflow(workflow).unwrap();
    fixture
        .reconciler()
        .unwrap()
        .matches(wf.id)
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect()
}

fn states(runner: &CliTestRunner, workflow: &str) -> Vec<ReviewState> {
    let fixture = runner.fixture();
    let wf = fixture.workflow(workflow).unwrap();
    fixture
        .reconciler()
        .unwrap()
        .matches(wf.id)
        .unwrap()
        .iter()
        .map(|m| m.review_state())
        .collect()
}

#[test]
fn test_confirm_and_reject_by_id_prefix() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people"]);

    let ids = match_ids(&runner, "people");
    assert_eq!(ids.len(), 2);
    let first = ids[0].to_string();
    let second = ids[1].to_string();

    runner.expect_success(&["confirm", "people", &first[..8]]);
    runner.expect_success(&["reject", "people", &second]);

    let fixture = runner.fixture();
    let wf = fixture.workflow("people").unwrap();
    let rec = fixture.reconciler().unwrap();
    let summary = rec.summary(wf.id).unwrap();
    assert_eq!(summary.confirmed, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.pending, 0);
}

#[test]
fn test_confirm_requires_ids_or_eligible() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people"]);

    let err = runner.expect_failure(&["confirm", "people"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));

    let err = runner.expect_failure(&["confirm", "people", "ab"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));

    let err = runner.expect_failure(&["confirm", "people", &Uuid::new_v4().to_string()]);
    assert!(matches!(err, TabreconError::NotFound { .. }));
}

#[test]
fn test_matches_listing_filters() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people"]);

    runner.expect_success(&["matches", "people"]);
    runner.expect_success(&["matches", "people", "--state", "pending", "--limit", "1"]);
    runner.expect_success(&["matches", "people", "--format", "json"]);

    let err = runner.expect_failure(&["matches", "people", "--state", "maybe"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));
}

#[test]
fn test_rematch_never_reproposes_rejected_pairs() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people"]);

    let ids = match_ids(&runner, "people");
    let rejected = ids[0].to_string();
    runner.expect_success(&["reject", "people", &rejected]);
    runner.expect_success(&["match", "people"]);

    let fixture = runner.fixture();
    let wf = fixture.workflow("people").unwrap();
    let rec = fixture.reconciler().unwrap();
    let all = rec.matches(wf.id).unwrap();
    let rejected_match = all
        .iter()
        .find(|m| m.review_state() == ReviewState::Rejected)
        .unwrap();

    // No active match may repeat the rejected pair
    assert!(all
        .iter()
        .filter(|m| m.review_state() != ReviewState::Rejected)
        .all(|m| (m.base_row_id, m.updated_row_id)
            != (rejected_match.base_row_id, rejected_match.updated_row_id)));
}

#[test]
fn test_rematch_keeps_confirmed_matches() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people"]);
    runner.expect_success(&["confirm", "people", "--eligible"]);
    runner.expect_success(&["match", "people"]);

    let current = states(&runner, "people");
    assert_eq!(current, vec![ReviewState::Confirmed, ReviewState::Confirmed]);
}

#[test]
fn test_match_with_threshold_override() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people", "--threshold", "1.0"]);

    let fixture = runner.fixture();
    assert_eq!(fixture.workflow("people").unwrap().confidence_threshold, 1.0);

    // Both pairs carry an edit, so neither reaches 1.0 but both are stored
    runner.expect_success(&["confirm", "people", "--eligible"]);
    let current = states(&runner, "people");
    assert_eq!(current, vec![ReviewState::Pending, ReviewState::Pending]);
}

#[test]
fn test_unmapping_every_column_blocks_matching() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");

    runner.expect_success(&["column", "people", "Name", "ignore"]);
    runner.expect_success(&["column", "people", "Email", "ignore"]);

    let err = runner.expect_failure(&["match", "people"]);
    assert!(matches!(err, TabreconError::NoMappingAvailable { .. }));
    assert!(err.is_recoverable());

    runner.expect_success(&["column", "people", "Email", "match"]);
    runner.expect_success(&["match", "people"]);
}

#[test]
fn test_manual_mapping_rules() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");

    // Email is already mapped to email_address and active
    let err = runner.expect_failure(&["map", "people", "Email", "full_name"]);
    assert!(matches!(err, TabreconError::DuplicateColumnAssignment { .. }));

    let err = runner.expect_failure(&["map", "people", "Phone", "full_name"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));

    runner.expect_success(&["column", "people", "Name", "ignore"]);
    runner.expect_success(&["column", "people", "Email", "ignore"]);
    runner.expect_success(&["map", "people", "Email", "full_name"]);

    let err = runner.expect_failure(&["column", "people", "Missing", "match"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));
    let err = runner.expect_failure(&["column", "people", "Email", "sometimes"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));
}

#[test]
fn test_stage_order_is_enforced() {
    let runner = CliTestRunner::new().unwrap();
    let (base, updated) = runner.fixture().create_people_files().unwrap();
    runner.expect_success(&["create", "people"]);

    let err = runner.expect_failure(&["align", "people"]);
    assert!(matches!(err, TabreconError::StageNotAllowed { .. }));

    runner.expect_success(&[
        "upload",
        "people",
        "--base",
        base.to_str().unwrap(),
        "--updated",
        updated.to_str().unwrap(),
    ]);
    let err = runner.expect_failure(&["review-columns", "people"]);
    assert!(matches!(err, TabreconError::IllegalTransition { .. }));

    runner.expect_success(&["align", "people"]);
    let err = runner.expect_failure(&["match", "people"]);
    assert!(matches!(err, TabreconError::StageNotAllowed { .. }));

    runner.expect_success(&["review-columns", "people"]);
    let err = runner.expect_failure(&["complete", "people"]);
    assert!(matches!(err, TabreconError::IllegalTransition { .. }));

    let err = runner.expect_failure(&["upload", "people", "--base", base.to_str().unwrap()]);
    assert!(matches!(err, TabreconError::StageNotAllowed { .. }));

    runner.expect_success(&["review-results", "people"]);
    runner.expect_success(&["complete", "people"]);
    assert_eq!(
        runner.fixture().workflow("people").unwrap().status,
        WorkflowStatus::Completed
    );
    let err = runner.expect_failure(&["fail", "people"]);
    assert!(matches!(err, TabreconError::IllegalTransition { .. }));
}
