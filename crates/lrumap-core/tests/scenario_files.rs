//! Scenario loading from disk, end to end.

use std::fs;

use lrumap_core::Error;
use lrumap_core::error::ScenarioError;
use lrumap_core::scenario::Scenario;

const NULL_VALUES: &str = r#"
name: null-values
description: "Absent keys are rejected or reported missing"
capacity: 2
steps:
  - { op: put, key: A, value: 1, missing: true }
  - { op: get, key: ~, missing: true }
  - { op: contains_key, key: ~, expect: false }
  - { op: remove, key: ~, missing: true }
  - { op: check, order: [A], size: 1 }
"#;

const EVICTION: &str = r#"
name: eviction
capacity: 2
steps:
  - { op: put_all, entries: [[x, 1], [y, 2], [z, 3]] }
  - { op: get, key: x, missing: true }
  - { op: check, order: [z, y], entries: [[y, 2], [z, 3]] }
"#;

#[test]
fn load_and_run_from_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("eviction.yaml");
    fs::write(&path, EVICTION).unwrap();

    let scenario = Scenario::load(&path).unwrap();
    assert_eq!(scenario.name, "eviction");
    assert_eq!(scenario.steps.len(), 3);

    let report = scenario.run(64).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures);
    assert_eq!(report.capacity, 2);
    assert_eq!(report.order, vec!["z", "y"]);
    assert_eq!(report.stats.evictions, 1);
    assert_eq!(report.stats.misses, 1);
}

#[test]
fn explicit_null_keys_read_as_missing() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("null.yaml");
    fs::write(&path, NULL_VALUES).unwrap();

    let report = Scenario::load(&path).unwrap().run(8).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures);
    assert_eq!(report.rendered, "[{1/2}{A : 1}]");
}

#[test]
fn missing_file_is_io_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let err = Scenario::load(&tmp.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(!err.remediation().summary.is_empty());
}

#[test]
fn malformed_yaml_is_parse_error() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("bad.yaml");
    fs::write(&path, "name: [unterminated\n").unwrap();

    let err = Scenario::load(&path).unwrap_err();
    assert!(matches!(err, Error::Scenario(ScenarioError::Parse(_))));
}

#[test]
fn report_json_lists_failures() {
    let scenario = Scenario::from_yaml(
        r#"
name: off-by-one
capacity: 1
steps:
  - { op: put, key: a, value: 1 }
  - { op: put, key: b, value: 2 }
  - { op: contains_key, key: a, expect: true }
"#,
    )
    .unwrap();
    let report = scenario.run(1).unwrap();
    assert!(!report.passed());

    let json = serde_json::to_value(&report).unwrap();
    let failures = json["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["step"], 3);
    assert_eq!(failures[0]["op"], "contains_key");
    assert_eq!(failures[0]["message"], "expected true, got false");
}
