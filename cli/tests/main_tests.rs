//! # unibuild CLI Main Integration Tests
//!
//! File: cli/tests/main_tests.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Verifies the top-level behavior of the `unibuild` binary: standard flags,
//! the subcommand listing and argument errors.
//!

mod common;

use common::unibuild_cmd;
use predicates::prelude::*;

#[test]
fn test_help_lists_subcommands() {
    unibuild_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("deploy"));
}

#[test]
fn test_version_flag() {
    unibuild_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_subcommand_is_a_usage_error() {
    unibuild_cmd().assert().failure().code(2);
}

#[test]
fn test_build_help_shows_operations_default() {
    unibuild_cmd()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--operations"))
        .stdout(predicate::str::contains("--detect-only"));
}
