//! # unibuild Process Execution Utilities (`common::process`)
//!
//! File: cli/src/common/process.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Every external command unibuild runs (build operations, pre-build toolchain
//! probes, `kubectl` calls) goes through the `CommandExecutor` trait defined here.
//!
//! The target working directory is part of each `CommandRequest`. Nothing in
//! this crate changes the process-wide current directory: concurrent workers
//! each hand their own project path to the child process, so two builds can
//! never run against each other's files.
//!
//! ## Architecture
//!
//! - `CommandRequest`: program, arguments, working directory, timeout, optional stdin.
//! - `CommandOutput`: captured stdout/stderr, elapsed time and a `CommandStatus`
//!   that keeps "exited non-zero" and "timed out" apart.
//! - `CommandExecutor`: the async seam. Tests substitute deterministic stubs.
//! - `ShellExecutor`: the real implementation on top of `tokio::process`.
//!
//! An `Err` from `execute` means the command could not be run at all (missing
//! working directory, missing shell). A command that ran and failed is an `Ok`
//! with a non-success status.
//!
//! ## Usage
//!
//! ```rust
//! let executor = ShellExecutor;
//! let request = CommandRequest::shell("npm ci", &project.path, Duration::from_secs(300));
//! let output = executor.execute(&request).await?;
//! if !output.success() {
//!     warn!("npm ci failed: {}", output.stderr);
//! }
//! ```
//!
use crate::core::error::UnibuildError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// A single command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Directory the child process starts in.
    pub working_dir: PathBuf,
    pub timeout: Duration,
    /// Data written to the child's stdin, which is closed afterwards.
    pub stdin: Option<String>,
    /// Original command line when built with `shell`, used for display.
    shell_line: Option<String>,
}

impl CommandRequest {
    /// Runs `command` through the platform shell (`sh -c` / `cmd /C`).
    pub fn shell(command: &str, working_dir: &Path, timeout: Duration) -> Self {
        let (program, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        CommandRequest {
            program: program.to_string(),
            args: vec![flag.to_string(), command.to_string()],
            working_dir: working_dir.to_path_buf(),
            timeout,
            stdin: None,
            shell_line: Some(command.to_string()),
        }
    }

    /// Runs `program` directly with `args`, without a shell.
    pub fn program<I, S>(program: &str, args: I, working_dir: &Path, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandRequest {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: working_dir.to_path_buf(),
            timeout,
            stdin: None,
            shell_line: None,
        }
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Human-readable command line.
    pub fn display(&self) -> String {
        match &self.shell_line {
            Some(line) => line.clone(),
            None if self.args.is_empty() => self.program.clone(),
            None => format!("{} {}", self.program, self.args.join(" ")),
        }
    }
}

/// How a command that was started ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The process exited. Signals map to `-1`.
    Exited(i32),
    /// The process did not finish within the request's timeout and was killed.
    TimedOut,
}

/// Captured result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == CommandStatus::Exited(0)
    }

    pub fn timed_out(&self) -> bool {
        self.status == CommandStatus::TimedOut
    }

    /// Exit code, `None` when the command timed out.
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            CommandStatus::Exited(code) => Some(code),
            CommandStatus::TimedOut => None,
        }
    }
}

/// Runs commands on behalf of the orchestrator, hooks and deployment platforms.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput, UnibuildError>;
}

/// Executes commands as child processes via `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellExecutor;

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput, UnibuildError> {
        let start = Instant::now();
        debug!(
            "Executing `{}` in {} (timeout {:?})",
            request.display(),
            request.working_dir.display(),
            request.timeout
        );

        let spawn_error = |source: std::io::Error| UnibuildError::Spawn {
            command: request.display(),
            working_dir: request.working_dir.clone(),
            source,
        };

        let mut child = Command::new(&request.program)
            .args(&request.args)
            .current_dir(&request.working_dir)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out child is dropped together with its wait future.
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        if let (Some(input), Some(mut pipe)) = (&request.stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .await
                .map_err(spawn_error)?;
            drop(pipe);
        }

        match tokio::time::timeout(request.timeout, child.wait_with_output()).await {
            Ok(waited) => {
                let output = waited.map_err(spawn_error)?;
                Ok(CommandOutput {
                    status: CommandStatus::Exited(output.status.code().unwrap_or(-1)),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    duration: start.elapsed(),
                })
            }
            Err(_) => {
                warn!(
                    "`{}` timed out after {:?} in {}",
                    request.display(),
                    request.timeout,
                    request.working_dir.display()
                );
                Ok(CommandOutput {
                    status: CommandStatus::TimedOut,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: start.elapsed(),
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_execute_simple_command() {
        let dir = tempdir().unwrap();
        let request = CommandRequest::shell("echo hello", dir.path(), TIMEOUT);
        let output = ShellExecutor.execute(&request).await.expect("execute failed");
        assert!(output.success());
        assert_eq!(output.exit_code(), Some(0));
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let dir = tempdir().unwrap();
        let request = CommandRequest::shell("echo oops >&2; exit 3", dir.path(), TIMEOUT);
        let output = ShellExecutor.execute(&request).await.expect("execute failed");
        assert!(!output.success());
        assert!(!output.timed_out());
        assert_eq!(output.exit_code(), Some(3));
        assert!(output.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn test_runs_in_requested_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let request = CommandRequest::shell("cat marker.txt", dir.path(), TIMEOUT);
        let output = ShellExecutor.execute(&request).await.unwrap();
        assert_eq!(output.stdout, "here");
    }

    #[tokio::test]
    async fn test_timeout_is_distinct_from_failure() {
        let dir = tempdir().unwrap();
        let request = CommandRequest::shell("sleep 5", dir.path(), Duration::from_millis(200));
        let output = ShellExecutor.execute(&request).await.unwrap();
        assert!(output.timed_out());
        assert!(!output.success());
        assert_eq!(output.exit_code(), None);
    }

    #[tokio::test]
    async fn test_missing_working_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let gone = dir.path().join("deleted");
        let request = CommandRequest::shell("true", &gone, TIMEOUT);
        let result = ShellExecutor.execute(&request).await;
        assert!(matches!(result, Err(UnibuildError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_stdin_is_forwarded() {
        let dir = tempdir().unwrap();
        let request =
            CommandRequest::program("cat", Vec::<String>::new(), dir.path(), TIMEOUT)
                .with_stdin("kind: Deployment\n");
        let output = ShellExecutor.execute(&request).await.unwrap();
        assert_eq!(output.stdout, "kind: Deployment\n");
    }

    #[test]
    fn test_display() {
        let dir = Path::new("/srv");
        assert_eq!(
            CommandRequest::shell("go build ./...", dir, TIMEOUT).display(),
            "go build ./..."
        );
        assert_eq!(
            CommandRequest::program("kubectl", ["rollout", "undo"], dir, TIMEOUT).display(),
            "kubectl rollout undo"
        );
    }
}
