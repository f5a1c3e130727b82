//! Edge cases in input data

use crate::common::{CliTestRunner, TestFixture};
use serde_json::json;
use tabrecon::ingest::LoadedDataset;
use tabrecon::model::{FieldValue, FileRole};
use tabrecon::{TabreconError, WorkflowStatus};

#[test]
fn test_quoted_fields_with_commas_and_quotes() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_raw(
            "quoted.csv",
            "id,name,notes\n1,\"Smith, Jane\",\"said \"\"hi\"\"\"\n",
        )
        .unwrap();

    let dataset = LoadedDataset::load(&path).unwrap();
    assert_eq!(dataset.rows[0]["name"], FieldValue::Text("Smith, Jane".into()));
    assert_eq!(dataset.rows[0]["notes"], FieldValue::Text("said \"hi\"".into()));
}

#[test]
fn test_unicode_values_match() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let base = fixture
        .create_csv(
            "base.csv",
            &[
                vec!["name", "city"],
                vec!["Zoë Brontë", "Zürich"],
                vec!["北京 Li", "北京"],
            ],
        )
        .unwrap();
    let updated = fixture
        .create_csv(
            "updated.csv",
            &[
                vec!["name", "city"],
                vec!["北京 Li", "北京"],
                vec!["Zoe Bronte", "Zürich"],
            ],
        )
        .unwrap();

    runner.expect_success(&["create", "unicode", "--threshold", "0.5"]);
    runner.expect_success(&[
        "upload",
        "unicode",
        "--base",
        base.to_str().unwrap(),
        "--updated",
        updated.to_str().unwrap(),
    ]);
    runner.expect_success(&["align", "unicode"]);
    runner.expect_success(&["review-columns", "unicode"]);
    runner.expect_success(&["match", "unicode"]);

    let wf = fixture.workflow("unicode").unwrap();
    let details = fixture.reconciler().unwrap().match_details(wf.id).unwrap();
    assert_eq!(details.len(), 2);
    let exact = details
        .iter()
        .find(|d| d.fields.iter().any(|f| f.base_value == "北京 Li"))
        .unwrap();
    assert!((exact.confidence - 1.0).abs() < 1e-9);
    assert!(exact.fields.iter().all(|f| f.base_value == f.updated_value));
}

#[test]
fn test_json_upload_with_mixed_types() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let base = fixture
        .create_json(
            "base.json",
            &json!([
                {"id": 1, "name": "Ada", "active": true},
                {"id": 2, "name": "Grace", "score": 9.5}
            ]),
        )
        .unwrap();
    let updated = fixture
        .create_csv("updated.csv", &[vec!["id", "name"], vec!["2", "Grace"], vec!["1", "Ada"]])
        .unwrap();

    runner.expect_success(&["create", "mixed"]);
    runner.expect_success(&[
        "upload",
        "mixed",
        "--base",
        base.to_str().unwrap(),
        "--updated",
        updated.to_str().unwrap(),
    ]);

    let wf = fixture.workflow("mixed").unwrap();
    let rec = fixture.reconciler().unwrap();
    let file = rec.file(wf.id, FileRole::Base).unwrap().unwrap();
    assert_eq!(file.columns, vec!["id", "name", "active", "score"]);
    let rows = rec.rows(wf.id, file.id).unwrap();
    assert_eq!(rows[0].data["id"], FieldValue::Integer(1));
    assert_eq!(rows[0].data["score"], FieldValue::Null);

    runner.expect_success(&["align", "mixed"]);
    runner.expect_success(&["review-columns", "mixed"]);
    runner.expect_success(&["match", "mixed"]);
    runner.expect_success(&["confirm", "mixed", "--eligible"]);

    // Integer 1 and text "1" compare on their textual form
    let summary = fixture.reconciler().unwrap().summary(wf.id).unwrap();
    assert_eq!(summary.confirmed, 2);
}

#[test]
fn test_tsv_upload() {
    let fixture = TestFixture::new().unwrap();
    let path = fixture
        .create_raw("people.tsv", "name\temail\nAda, Countess\tada@example.com\n")
        .unwrap();
    let dataset = LoadedDataset::load(&path).unwrap();
    assert_eq!(dataset.columns, vec!["name", "email"]);
    assert_eq!(dataset.rows[0]["name"], FieldValue::Text("Ada, Countess".into()));
}

#[test]
fn test_missing_values_do_not_count() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let base = fixture
        .create_raw("base.csv", "name,email\nAda Lovelace,\nAlan Turing,alan@example.com\n")
        .unwrap();
    let updated = fixture
        .create_raw("updated.csv", "name,email\nAda Lovelace,ada@example.com\nAlan Turing,alan@example.com\n")
        .unwrap();

    runner.expect_success(&["create", "gaps"]);
    runner.expect_success(&[
        "upload",
        "gaps",
        "--base",
        base.to_str().unwrap(),
        "--updated",
        updated.to_str().unwrap(),
    ]);
    runner.expect_success(&["align", "gaps"]);
    runner.expect_success(&["review-columns", "gaps"]);
    runner.expect_success(&["match", "gaps"]);

    let wf = fixture.workflow("gaps").unwrap();
    let details = fixture.reconciler().unwrap().match_details(wf.id).unwrap();
    let ada = details
        .iter()
        .find(|d| d.fields.iter().any(|f| f.base_value == "Ada Lovelace"))
        .unwrap();

    // The empty email is skipped rather than scored as a mismatch
    assert_eq!(ada.fields.len(), 1);
    assert!((ada.confidence - 1.0).abs() < 1e-9);
}

#[test]
fn test_header_only_files_produce_no_matches() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let base = fixture.create_raw("base.csv", "name,email\n").unwrap();
    let updated = fixture.create_raw("updated.csv", "name,email\n").unwrap();

    runner.expect_success(&["create", "empty"]);
    runner.expect_success(&[
        "upload",
        "empty",
        "--base",
        base.to_str().unwrap(),
        "--updated",
        updated.to_str().unwrap(),
    ]);
    runner.expect_success(&["align", "empty"]);
    runner.expect_success(&["review-columns", "empty"]);
    runner.expect_success(&["match", "empty"]);

    let wf = fixture.workflow("empty").unwrap();
    let summary = fixture.reconciler().unwrap().summary(wf.id).unwrap();
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.base_rows, 0);
}

#[test]
fn test_empty_file_is_rejected() {
    let runner = CliTestRunner::new().unwrap();
    let path = runner.fixture().create_raw("blank.csv", "").unwrap();

    runner.expect_success(&["create", "blank"]);
    let err = runner.expect_failure(&["upload", "blank", "--base", path.to_str().unwrap()]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));
    assert_eq!(
        runner.fixture().workflow("blank").unwrap().status,
        WorkflowStatus::Created
    );
}

#[test]
fn test_malformed_inputs() {
    let fixture = TestFixture::new().unwrap();

    let ragged = fixture.create_raw("ragged.csv", "a,b\n1,2,3\n").unwrap();
    assert!(matches!(
        LoadedDataset::load(&ragged),
        Err(TabreconError::InvalidInput { .. })
    ));

    let duplicate = fixture.create_raw("dup.csv", "id,name,id\n").unwrap();
    assert!(matches!(
        LoadedDataset::load(&duplicate),
        Err(TabreconError::InvalidInput { .. })
    ));

    let object = fixture.create_json("object.json", &json!({"id": 1})).unwrap();
    assert!(matches!(
        LoadedDataset::load(&object),
        Err(TabreconError::InvalidInput { .. })
    ));

    let broken = fixture.create_raw("broken.json", "[{\"id\": ").unwrap();
    assert!(matches!(
        LoadedDataset::load(&broken),
        Err(TabreconError::Json(_))
    ));
}

#[test]
fn test_unsupported_and_missing_files() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let parquet = fixture.create_raw("data.parquet", "PAR1").unwrap();

    runner.expect_success(&["create", "formats"]);
    let err = runner.expect_failure(&["upload", "formats", "--base", parquet.to_str().unwrap()]);
    assert!(matches!(err, TabreconError::UnsupportedFormat { .. }));

    let err = runner.expect_failure(&["upload", "formats", "--base", "nope.csv"]);
    assert!(matches!(err, TabreconError::InvalidInput { .. }));
}
