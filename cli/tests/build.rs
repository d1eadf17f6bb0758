//! # unibuild Build Command Integration Tests
//!
//! File: cli/tests/build.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Runs `unibuild build` against temporary project trees with a small custom
//! registry. Commands are plain `sh` builtins so the tests do not depend on
//! any language toolchain.
//!

mod common;

use common::{unibuild_cmd, write_file};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

const REGISTRY: &str = r#"
[global]
max_parallel = 2

[languages.text]
project_files = ["project.txt"]
file_patterns = ["*.txt"]

[languages.text.commands]
test = "true"
build = "false || echo built"

[languages.broken]
project_files = ["broken.cfg"]

[languages.broken.commands]
build = "exit 3"
"#;

#[test]
fn test_detect_only_lists_projects_with_confidence() {
    let workspace = tempdir().unwrap();
    let root = workspace.path();
    write_file(root, "registry.toml", REGISTRY);
    write_file(root, "tree/app/project.txt", "");
    // Excluded directories are never descended into.
    write_file(root, "tree/node_modules/dep/project.txt", "");

    unibuild_cmd()
        .args(["build", "--detect-only", "--path"])
        .arg(root.join("tree"))
        .arg("--config")
        .arg(root.join("registry.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Detected 1 projects"))
        .stdout(predicate::str::contains("app (text) - 90.0% confidence"));
}

#[test]
fn test_build_writes_report_and_succeeds() {
    let workspace = tempdir().unwrap();
    let root = workspace.path();
    write_file(root, "registry.toml", REGISTRY);
    write_file(root, "tree/app/project.txt", "");
    let reports = root.join("reports");

    unibuild_cmd()
        .args(["build", "--operations", "test", "build", "package", "--path"])
        .arg(root.join("tree"))
        .arg("--config")
        .arg(root.join("registry.toml"))
        .arg("--report-dir")
        .arg(&reports)
        .assert()
        .success()
        .stdout(predicate::str::contains("Success Rate: 100.0%"));

    let report: Value = serde_json::from_str(
        &fs::read_to_string(reports.join("build-results-latest.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["summary"]["total_projects"], 1);
    let project = &report["projects"][0];
    assert_eq!(project["status"], "success");
    let operations = project["operations"].as_array().unwrap();
    assert_eq!(operations.len(), 3);
    assert_eq!(operations[1]["operation"], "build");
    assert_eq!(operations[1]["command"], "echo built");
    assert_eq!(operations[2]["skipped"], true);
    assert_eq!(operations[2]["message"], "No command defined");
    assert!(operations[2].get("error").is_none());
}

#[test]
fn test_failed_project_sets_exit_status_and_others_still_build() {
    let workspace = tempdir().unwrap();
    let root = workspace.path();
    write_file(root, "registry.toml", REGISTRY);
    write_file(root, "tree/good/project.txt", "");
    write_file(root, "tree/bad/broken.cfg", "");
    let reports = root.join("reports");

    unibuild_cmd()
        .args(["build", "--operations", "build", "--path"])
        .arg(root.join("tree"))
        .arg("--config")
        .arg(root.join("registry.toml"))
        .arg("--report-dir")
        .arg(&reports)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Failed: 1"));

    let report: Value = serde_json::from_str(
        &fs::read_to_string(reports.join("build-results-latest.json")).unwrap(),
    )
    .unwrap();
    let statuses: Vec<_> = report["projects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["name"].as_str().unwrap().to_string(), p["status"].clone()))
        .collect();
    assert!(statuses.contains(&("good".to_string(), Value::from("success"))));
    assert!(statuses.contains(&("bad".to_string(), Value::from("failed"))));
    let bad = report["projects"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "bad")
        .unwrap();
    assert_eq!(bad["operations"][0]["exit_code"], 3);
}

#[test]
fn test_missing_root_is_an_error() {
    let workspace = tempdir().unwrap();
    unibuild_cmd()
        .args(["build", "--detect-only", "--path"])
        .arg(workspace.path().join("does-not-exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_missing_registry_detects_nothing() {
    let workspace = tempdir().unwrap();
    write_file(workspace.path(), "app/Cargo.toml", "");
    unibuild_cmd()
        .args(["build", "--detect-only", "--path"])
        .arg(workspace.path())
        .arg("--config")
        .arg(workspace.path().join("missing.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Detected 0 projects"));
}
