//! # unibuild Build Results and Reports
//!
//! File: cli/src/commands/build/report.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Result types produced by the orchestrator and the aggregated `BuildReport`
//! persisted at the end of a run.
//!
//! - `OperationResult`: one operation (e.g. `test`) of one project.
//! - `ProjectBuildResult`: all operations of one project and its status.
//! - `BuildReport`: every project of the run plus a `BuildSummary`.
//!
//! A report is written twice: `build-results-<build_id>.json` and
//! `build-results-latest.json`, both in the configured report directory.
//! Durations are serialized as fractional seconds.
//!
use super::detector::DetectedProject;
use super::hooks::HookReport;
use crate::common::fs::io;
use crate::common::process::CommandOutput;
use crate::core::error::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// File name of the report that is overwritten on every run.
pub const LATEST_REPORT_FILENAME: &str = "build-results-latest.json";

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub operation: String,
    /// The command that was run. For fallback chains, the alternative that
    /// succeeded, or the last one attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub success: bool,
    /// No command is configured for this operation.
    pub skipped: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` for skipped and timed-out operations.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Informational note, e.g. why an operation was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
}

impl OperationResult {
    pub fn skipped(operation: &str) -> Self {
        OperationResult {
            operation: operation.to_string(),
            command: None,
            success: true,
            skipped: true,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out: false,
            error: None,
            message: Some("No command defined".to_string()),
            duration: Duration::ZERO,
        }
    }

    pub fn from_output(
        operation: &str,
        command: &str,
        output: CommandOutput,
        duration: Duration,
    ) -> Self {
        let timed_out = output.timed_out();
        OperationResult {
            operation: operation.to_string(),
            command: Some(command.to_string()),
            success: output.success(),
            skipped: false,
            exit_code: output.exit_code(),
            timed_out,
            error: timed_out.then(|| format!("Command timed out after {:?}", output.duration)),
            message: None,
            stdout: output.stdout,
            stderr: output.stderr,
            duration,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Success,
    /// At least one operation's command failed or timed out.
    Failed,
    /// The project could not be built at all (e.g. its directory is gone).
    Error,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProjectBuildResult {
    pub name: String,
    pub path: PathBuf,
    pub language: String,
    pub confidence: f64,
    /// Operations in the order they were requested.
    pub operations: Vec<OperationResult>,
    pub status: ProjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_build: Option<HookReport>,
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
}

impl ProjectBuildResult {
    /// An empty, successful result for `project`.
    pub fn new(project: &DetectedProject) -> Self {
        ProjectBuildResult {
            name: project.name.clone(),
            path: project.path.clone(),
            language: project.language.clone(),
            confidence: project.confidence,
            operations: Vec::new(),
            status: ProjectStatus::Success,
            error: None,
            pre_build: None,
            duration: Duration::ZERO,
        }
    }

    #[cfg(test)]
    pub fn operation(&self, name: &str) -> Option<&OperationResult> {
        self.operations.iter().find(|o| o.operation == name)
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub error: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub total_projects: usize,
    pub successful_projects: usize,
    pub failed_projects: usize,
    pub error_projects: usize,
    /// `successful / total`, or 0 for an empty run.
    pub success_rate: f64,
    pub language_stats: BTreeMap<String, LanguageStats>,
    /// Sum of per-project durations, in seconds.
    pub total_duration: f64,
}

impl BuildSummary {
    pub fn from_projects(projects: &[ProjectBuildResult]) -> Self {
        let mut language_stats: BTreeMap<String, LanguageStats> = BTreeMap::new();
        let (mut success, mut failed, mut error) = (0, 0, 0);
        for project in projects {
            let stats = language_stats.entry(project.language.clone()).or_default();
            stats.total += 1;
            match project.status {
                ProjectStatus::Success => {
                    success += 1;
                    stats.success += 1;
                }
                ProjectStatus::Failed => {
                    failed += 1;
                    stats.failed += 1;
                }
                ProjectStatus::Error => {
                    error += 1;
                    stats.error += 1;
                }
            }
        }
        let total = projects.len();
        BuildSummary {
            total_projects: total,
            successful_projects: success,
            failed_projects: failed,
            error_projects: error,
            success_rate: if total > 0 {
                success as f64 / total as f64
            } else {
                0.0
            },
            language_stats,
            total_duration: projects.iter().map(|p| p.duration.as_secs_f64()).sum(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_projects == 0 && self.error_projects == 0
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub build_id: String,
    pub timestamp: DateTime<Utc>,
    pub projects: Vec<ProjectBuildResult>,
    pub summary: BuildSummary,
}

impl BuildReport {
    /// Finalizes a run. Projects are sorted by path so the report does not
    /// depend on completion order.
    pub fn new(projects: Vec<ProjectBuildResult>) -> Self {
        let timestamp = Utc::now();
        Self::with_id(format!("build-{}", timestamp.timestamp()), timestamp, projects)
    }

    pub fn with_id(
        build_id: String,
        timestamp: DateTime<Utc>,
        mut projects: Vec<ProjectBuildResult>,
    ) -> Self {
        projects.sort_by(|a, b| a.path.cmp(&b.path));
        let summary = BuildSummary::from_projects(&projects);
        BuildReport {
            build_id,
            timestamp,
            projects,
            summary,
        }
    }

    /// Writes the stamped and the latest report into `dir`, returning the
    /// stamped report's path.
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        let stamped = dir.join(format!("build-results-{}.json", self.build_id));
        io::write_json_file(&stamped, self)
            .with_context(|| format!("Failed to write build report {}", stamped.display()))?;
        io::write_json_file(&dir.join(LATEST_REPORT_FILENAME), self)
            .context("Failed to write latest build report")?;
        info!("Results saved to {}", stamped.display());
        Ok(stamped)
    }
}
