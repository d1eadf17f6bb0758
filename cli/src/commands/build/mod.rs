//! # unibuild Build Command (`unibuild build`)
//!
//! File: cli/src/commands/build/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Detects every project under a root directory and runs the requested build
//! operations for each of them, then prints a summary and writes a JSON
//! report. With `--detect-only`, only the detection results are printed.
//!
//! ## Architecture
//!
//! - `registry`: The immutable `LanguageRegistry` built from `languages.toml`.
//! - `detector`: `ProjectDetector`, the directory walk and confidence scoring.
//! - `hooks`: Optional per-language pre-build checks.
//! - `orchestrator`: The worker pool, per-project failure boundary and fallback commands.
//! - `report`: Result types, the summary and report persistence.
//!
//! ## Examples
//!
//! ```bash
//! # List detected projects with their confidence
//! unibuild build --detect-only
//!
//! # Lint and test everything under ./services, four at a time
//! unibuild build --path ./services --operations lint test --max-parallel 4
//!
//! # Build one project after another, with toolchain checks first
//! unibuild build --sequential --hooks
//! ```
//!
//! The exit status is non-zero when any project ended `failed` or `error`.
//!
use super::CommandOutcome;
use crate::common::process::ShellExecutor;
use crate::core::config;
use crate::core::error::{Result, UnibuildError};
use anyhow::anyhow;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod detector;
pub mod hooks;
pub mod orchestrator;
pub mod registry;
pub mod report;

use detector::ProjectDetector;
use orchestrator::{BuildOptions, Orchestrator};
use registry::LanguageRegistry;
use report::BuildSummary;

/// # Build Arguments (`BuildArgs`)
///
/// Options for `unibuild build`. Flags that mirror `[global]` registry settings
/// override the registry file for this run only.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Root directory to scan for projects.
    #[arg(long, default_value = ".")]
    path: String,

    /// Operations to run for every project, in order.
    #[arg(
        long,
        num_args = 1..,
        default_values = ["install", "lint", "test", "build", "package"]
    )]
    operations: Vec<String>,

    /// Path to the language registry (`languages.toml`).
    #[arg(short, long, env = "UNIBUILD_CONFIG")]
    config: Option<String>,

    /// Only detect and list projects; do not build.
    #[arg(long)]
    detect_only: bool,

    /// Build projects one after another.
    #[arg(long)]
    sequential: bool,

    /// Maximum number of projects built at the same time.
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Directory the JSON reports are written to.
    #[arg(long)]
    report_dir: Option<String>,

    /// Run language pre-build hooks before each project's operations.
    #[arg(long)]
    hooks: bool,
}

/// # Handle Build Command (`handle_build`)
///
/// 1. Loads the registry and applies command-line overrides.
/// 2. Detects projects under `--path`.
/// 3. Either prints them (`--detect-only`) or builds them, persists the report
///    and prints the summary.
///
/// ## Returns
///
/// * `Ok(CommandOutcome::Failure)` if any project failed or errored.
/// * `Err` if the root path is unusable or the report cannot be written.
pub async fn handle_build(args: BuildArgs) -> Result<CommandOutcome> {
    debug!("Build args: {:?}", args);
    let mut registry = LanguageRegistry::load(args.config.as_deref());
    apply_overrides(&mut registry, &args);
    if registry.is_empty() {
        warn!("The language registry is empty; no projects will be found.");
    }

    let root = PathBuf::from(shellexpand::tilde(&args.path).into_owned());
    if !root.is_dir() {
        return Err(anyhow!(UnibuildError::ProjectDirectory {
            path: root,
            reason: "root path is not a directory".to_string(),
        }));
    }

    let projects: Vec<_> = ProjectDetector::new(&registry).detect(&root).collect();
    info!("Detected {} projects", projects.len());

    if args.detect_only {
        println!("Detected {} projects:", projects.len());
        for project in &projects {
            println!(
                "  - {} ({}) - {:.1}% confidence",
                project.name,
                project.language,
                project.confidence * 100.0
            );
        }
        return Ok(CommandOutcome::Success);
    }

    let options = BuildOptions::from_registry(&registry, args.operations);
    let report_dir = PathBuf::from(&registry.global().report_dir);
    let orchestrator = Orchestrator::new(Arc::new(registry), Arc::new(ShellExecutor));
    let report = orchestrator.build(projects, &options).await;
    let saved = report.persist(&report_dir)?;

    print_summary(&report.summary, &saved);
    Ok(if report.summary.all_succeeded() {
        CommandOutcome::Success
    } else {
        CommandOutcome::Failure
    })
}

fn apply_overrides(registry: &mut LanguageRegistry, args: &BuildArgs) {
    let global = registry.global_mut();
    if args.sequential {
        global.parallel_builds = false;
    }
    if let Some(max) = args.max_parallel {
        global.max_parallel = max;
    }
    if let Some(dir) = &args.report_dir {
        global.report_dir = shellexpand::tilde(dir).into_owned();
    }
    if args.hooks {
        global.pre_build_hooks = true;
    }
    config::validate_global(global);
}

fn print_summary(summary: &BuildSummary, saved: &Path) {
    println!("\n=== Build Summary ===");
    println!("Total Projects: {}", summary.total_projects);
    println!("Successful: {}", summary.successful_projects);
    println!("Failed: {}", summary.failed_projects);
    println!("Errors: {}", summary.error_projects);
    println!("Success Rate: {:.1}%", summary.success_rate * 100.0);
    println!("Total Duration: {:.2}s", summary.total_duration);

    println!("\n=== Language Breakdown ===");
    for (language, stats) in &summary.language_stats {
        println!("{}: {}/{} successful", language, stats.success, stats.total);
    }
    println!("\nReport: {}", saved.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_defaults() {
        let args = BuildArgs::try_parse_from(["build"]).unwrap();
        assert_eq!(args.path, ".");
        assert_eq!(
            args.operations,
            vec!["install", "lint", "test", "build", "package"]
        );
        assert!(!args.detect_only);
        assert!(!args.sequential);
    }

    #[test]
    fn test_parses_operations_and_overrides() {
        let args = BuildArgs::try_parse_from([
            "build",
            "--path",
            "services",
            "--operations",
            "lint",
            "test",
            "--max-parallel",
            "8",
            "--hooks",
        ])
        .unwrap();
        assert_eq!(args.path, "services");
        assert_eq!(args.operations, vec!["lint", "test"]);
        assert_eq!(args.max_parallel, Some(8));
        assert!(args.hooks);
    }

    #[test]
    fn test_overrides_are_applied_and_validated() {
        let args = BuildArgs::try_parse_from([
            "build",
            "--sequential",
            "--max-parallel",
            "0",
            "--report-dir",
            "out/reports",
        ])
        .unwrap();
        let mut registry = LanguageRegistry::default();
        apply_overrides(&mut registry, &args);
        let global = registry.global();
        assert!(!global.parallel_builds);
        assert_eq!(global.max_parallel, 1);
        assert_eq!(global.report_dir, "out/reports");
    }
}
