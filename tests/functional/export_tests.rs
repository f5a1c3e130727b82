//! Export of reviewed matches

use crate::common::CliTestRunner;
use std::fs;

#[test]
fn test_csv_export_to_default_location() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people"]);
    runner.expect_success(&["confirm", "people", "--eligible"]);
    runner.expect_success(&["export", "people"]);

    let path = runner.fixture().workspace.exports_dir.join("people.csv");
    let content = fs::read_to_string(&path).unwrap();
    let mut reader = csv::Reader::from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(
        headers,
        vec![
            "match_id",
            "state",
            "confidence",
            "base_row",
            "updated_row",
            "base.Name",
            "updated.full_name",
            "base.Email",
            "updated.email_address",
        ]
    );

    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| &r[1] == "confirmed"));
    let bob = records.iter().find(|r| &r[5] == "Bob Smith").unwrap();
    assert_eq!(&bob[6], "Bob Smith");
    assert_eq!(&bob[8], "bob.smith@example.org");
}

#[test]
fn test_export_skips_pending_unless_all() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["match", "people"]);

    let root = runner.fixture().root();
    let confirmed_only = root.join("confirmed.json");
    let everything = root.join("everything.json");

    runner.expect_success(&[
        "export",
        "people",
        "--format",
        "json",
        "--output",
        confirmed_only.to_str().unwrap(),
    ]);
    runner.expect_success(&[
        "export",
        "people",
        "--format",
        "json",
        "--all",
        "--output",
        everything.to_str().unwrap(),
    ]);

    let none: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&confirmed_only).unwrap()).unwrap();
    assert_eq!(none.as_array().unwrap().len(), 0);

    let all: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&everything).unwrap()).unwrap();
    let items = all.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|m| m["state"] == "pending"));
    assert!(items.iter().any(|m| m["base"]["Name"] == "Alice Johnson"
        && m["updated"]["full_name"] == "Alice Jonson"));
}

#[test]
fn test_export_leaves_out_rejected_and_ignored_columns() {
    let runner = CliTestRunner::new().unwrap();
    runner.prepare_reviewed_workflow("people");
    runner.expect_success(&["column", "people", "Email", "ignore"]);
    runner.expect_success(&["match", "people"]);

    let fixture = runner.fixture();
    let wf = fixture.workflow("people").unwrap();
    let ids: Vec<String> = fixture
        .reconciler()
        .unwrap()
        .matches(wf.id)
        .unwrap()
        .iter()
        .map(|m| m.id.to_string())
        .collect();
    runner.expect_success(&["reject", "people", &ids[0]]);

    let output = fixture.root().join("out.json");
    runner.expect_success(&[
        "export",
        "people",
        "--all",
        "--format",
        "json",
        "--output",
        output.to_str().unwrap(),
    ]);

    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let items = exported.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0]["base"].get("Email").is_none());
    assert!(items[0]["base"].get("Name").is_some());
}

#[test]
fn test_unknown_export_format() {
    let runner = CliTestRunner::new().unwrap();
    runner.expect_success(&["create", "people"]);
    let err = runner.expect_failure(&["export", "people", "--format", "xlsx"]);
    assert!(matches!(err, tabrecon::TabreconError::InvalidInput { .. }));
}
