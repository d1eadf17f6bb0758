//! # unibuild Build Orchestrator
//!
//! File: cli/src/commands/build/orchestrator.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Runs the requested operations (`install`, `lint`, `test`, ...) for every
//! detected project and collects the results into a `BuildReport`.
//!
//! ## Architecture
//!
//! - Projects at or below `global.min_build_confidence` are dropped up front.
//! - In parallel mode each project is a `tokio` task gated by a `Semaphore` with
//!   `max_parallel` permits. In sequential mode projects run one after another.
//!   Either way a project's operations run in order inside one task.
//! - `Orchestrator::build_project` is the failure boundary for a single project:
//!   anything that goes wrong outside a command's own exit status (missing
//!   directory, a command that cannot be spawned) becomes that project's
//!   `error` status. A task that panics is caught when it is joined and turned
//!   into an `error` result the same way. Sibling projects are never affected.
//! - A command template may hold alternatives separated by
//!   `global.fallback_separator` (`||`). They are tried in order until one exits
//!   zero. A timeout ends the chain.
//!
//! Every command receives its project directory through `CommandRequest`; the
//! orchestrator never changes the process working directory.
//!
use super::detector::DetectedProject;
use super::registry::LanguageRegistry;
use super::report::{BuildReport, OperationResult, ProjectBuildResult, ProjectStatus};
use crate::common::process::{CommandExecutor, CommandRequest};
use crate::core::error::{Result, UnibuildError};
use anyhow::anyhow;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// How a build run is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Operations in execution order.
    pub operations: Vec<String>,
    pub parallel: bool,
    pub max_workers: usize,
    /// Run each language's pre-build hook before its operations.
    pub run_hooks: bool,
}

impl BuildOptions {
    /// Options taken from the registry's `[global]` section.
    pub fn from_registry(registry: &LanguageRegistry, operations: Vec<String>) -> Self {
        let global = registry.global();
        BuildOptions {
            operations,
            parallel: global.parallel_builds,
            max_workers: global.max_parallel.max(1),
            run_hooks: global.pre_build_hooks,
        }
    }
}

/// Cheap to clone; clones share the registry and executor.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<LanguageRegistry>,
    executor: Arc<dyn CommandExecutor>,
}

impl Orchestrator {
    pub fn new(registry: Arc<LanguageRegistry>, executor: Arc<dyn CommandExecutor>) -> Self {
        Orchestrator { registry, executor }
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.registry.global().command_timeout_secs)
    }

    /// Builds every eligible project and returns the finalized report.
    pub async fn build(&self, projects: Vec<DetectedProject>, options: &BuildOptions) -> BuildReport {
        let threshold = self.registry.global().min_build_confidence;
        let detected = projects.len();
        let eligible: Vec<DetectedProject> = projects
            .into_iter()
            .filter(|p| {
                let keep = p.confidence > threshold;
                if !keep {
                    debug!(
                        "Skipping {} ({:.0}% confidence is not above {:.0}%)",
                        p.name,
                        p.confidence * 100.0,
                        threshold * 100.0
                    );
                }
                keep
            })
            .collect();
        info!(
            "Building {} of {} detected projects ({})",
            eligible.len(),
            detected,
            if options.parallel {
                format!("parallel, {} workers", options.max_workers.max(1))
            } else {
                "sequential".to_string()
            }
        );

        let results = if options.parallel {
            self.build_parallel(eligible, options).await
        } else {
            let mut results = Vec::with_capacity(eligible.len());
            for project in &eligible {
                results.push(
                    self.build_project(project, &options.operations, options.run_hooks)
                        .await,
                );
            }
            results
        };

        BuildReport::new(results)
    }

    async fn build_parallel(
        &self,
        projects: Vec<DetectedProject>,
        options: &BuildOptions,
    ) -> Vec<ProjectBuildResult> {
        let semaphore = Arc::new(Semaphore::new(options.max_workers.max(1)));
        let operations: Arc<[String]> = options.operations.clone().into();
        let mut tasks = Vec::with_capacity(projects.len());

        for project in projects {
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let operations = Arc::clone(&operations);
            let run_hooks = options.run_hooks;
            let placeholder = ProjectBuildResult::new(&project);
            let task = tokio::spawn(async move {
                // The semaphore is never closed, so acquiring only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                this.build_project(&project, &operations, run_hooks).await
            });
            tasks.push((placeholder, task));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (mut placeholder, task) in tasks {
            match task.await {
                Ok(result) => results.push(result),
                Err(join_error) => {
                    error!("Build task for {} aborted: {}", placeholder.name, join_error);
                    placeholder.status = ProjectStatus::Error;
                    placeholder.error = Some(format!("Build task aborted: {}", join_error));
                    results.push(placeholder);
                }
            }
        }
        results
    }

    /// Builds one project. Never fails: errors become `ProjectStatus::Error`.
    pub async fn build_project(
        &self,
        project: &DetectedProject,
        operations: &[String],
        run_hooks: bool,
    ) -> ProjectBuildResult {
        info!("Building project: {} ({})", project.name, project.language);
        let start = Instant::now();
        let mut result = ProjectBuildResult::new(project);

        if let Err(e) = self
            .run_project(project, operations, run_hooks, &mut result)
            .await
        {
            error!("Error building {}: {:#}", project.name, e);
            result.status = ProjectStatus::Error;
            result.error = Some(format!("{:#}", e));
        }

        result.duration = start.elapsed();
        info!(
            "Finished {} with status {:?} in {:.2}s",
            project.name,
            result.status,
            result.duration.as_secs_f64()
        );
        result
    }

    async fn run_project(
        &self,
        project: &DetectedProject,
        operations: &[String],
        run_hooks: bool,
        result: &mut ProjectBuildResult,
    ) -> Result<()> {
        if !project.path.is_dir() {
            return Err(anyhow!(UnibuildError::ProjectDirectory {
                path: project.path.clone(),
                reason: "directory does not exist".to_string(),
            }));
        }
        let spec = self.registry.get(&project.language).ok_or_else(|| {
            anyhow!(UnibuildError::Config(format!(
                "language '{}' is not in the registry",
                project.language
            )))
        })?;

        if run_hooks {
            let report = spec
                .hook
                .run(self.executor.as_ref(), &project.path, self.command_timeout())
                .await;
            result.pre_build = Some(report);
        }

        for operation in operations {
            let op_result = match spec.command(operation) {
                Some(template) => {
                    self.run_operation(operation, template, &project.path)
                        .await?
                }
                None => {
                    info!(
                        "Skipping {} for {} (no command defined)",
                        operation, project.name
                    );
                    OperationResult::skipped(operation)
                }
            };
            if !op_result.success {
                warn!("Operation {} failed for {}", operation, project.name);
                result.status = ProjectStatus::Failed;
            }
            result.operations.push(op_result);
        }
        Ok(())
    }

    /// Runs one operation's command template, trying fallback alternatives in
    /// order. Errors only when a command cannot be started.
    async fn run_operation(
        &self,
        operation: &str,
        template: &str,
        dir: &Path,
    ) -> std::result::Result<OperationResult, UnibuildError> {
        let separator = self.registry.global().fallback_separator.as_str();
        let alternatives: Vec<&str> = template
            .split(separator)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        let Some((last, rest)) = alternatives.split_last() else {
            return Ok(OperationResult::skipped(operation));
        };

        let start = Instant::now();
        for command in rest {
            info!("Running {}: {}", operation, command);
            let request = CommandRequest::shell(command, dir, self.command_timeout());
            let output = self.executor.execute(&request).await?;
            if output.success() || output.timed_out() {
                return Ok(OperationResult::from_output(
                    operation,
                    command,
                    output,
                    start.elapsed(),
                ));
            }
            debug!(
                "Alternative `{}` exited with {:?}, trying the next one",
                command,
                output.exit_code()
            );
        }

        info!("Running {}: {}", operation, last);
        let request = CommandRequest::shell(last, dir, self.command_timeout());
        let output = self.executor.execute(&request).await?;
        Ok(OperationResult::from_output(
            operation,
            last,
            output,
            start.elapsed(),
        ))
    }
}
