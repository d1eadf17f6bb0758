//! # unibuild CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Shared helpers for the integration tests in `cli/tests/`. Each test file
//! declares `mod common;` and drives the compiled `unibuild` binary through
//! `assert_cmd`.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::fs;
use std::path::Path;

/// # Get unibuild Command (`unibuild_cmd`)
///
/// Returns an `assert_cmd::Command` for the `unibuild` binary built for this
/// test run, with `RUST_LOG` cleared so log output does not depend on the
/// caller's environment.
///
/// ## Panics
/// Panics if the binary cannot be found via `Command::cargo_bin`.
pub fn unibuild_cmd() -> Command {
    let mut cmd = Command::cargo_bin("unibuild").expect("Failed to find unibuild binary for testing");
    cmd.env_remove("RUST_LOG")
        .env_remove("UNIBUILD_CONFIG")
        .env_remove("UNIBUILD_DEPLOY_CONFIG");
    cmd
}

/// Writes `content` to `dir/relative`, creating parent directories.
pub fn write_file(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, content).expect("Failed to write test file");
}
