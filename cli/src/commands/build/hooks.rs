//! # unibuild Pre-Build Hooks
//!
//! File: cli/src/commands/build/hooks.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Optional checks run in a project directory before its build operations
//! (`--hooks` or `global.pre_build_hooks = true`). A hook probes the language
//! toolchain (`go version`, `rustc --version`, ...) and inspects dependency
//! files, producing a `HookReport`: a list of human-readable notes plus an
//! advisory status.
//!
//! Hook results are informational. They are attached to the project's build
//! result as `pre_build` and never change the project's status. Toolchain
//! probes go through the same `CommandExecutor` as build commands, with the
//! project directory passed explicitly.
//!
use crate::common::process::{CommandExecutor, CommandOutput, CommandRequest};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Target directories above this size get a cleanup note.
const LARGE_TARGET_DIR_MB: f64 = 500.0;

/// The pre-build behaviour selected for a language when the registry is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageHook {
    Node,
    Python,
    Go,
    Rust,
    Java,
    DotNet,
    Generic,
}

/// Advisory outcome of a hook.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HookStatus {
    Success,
    /// A required toolchain is missing. The build still runs.
    Error,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct HookReport {
    pub status: HookStatus,
    pub actions: Vec<String>,
}

impl HookReport {
    fn new() -> Self {
        HookReport {
            status: HookStatus::Success,
            actions: Vec::new(),
        }
    }

    fn note(&mut self, action: impl Into<String>) {
        self.actions.push(action.into());
    }

    fn fail(mut self, action: impl Into<String>) -> Self {
        self.status = HookStatus::Error;
        self.note(action);
        self
    }
}

/// Result of running a toolchain probe.
enum Probe {
    Ran(CommandOutput),
    /// The program could not be started.
    Unavailable,
}

impl LanguageHook {
    /// Maps a registry language id to its hook.
    pub fn for_language(id: &str) -> Self {
        match id.to_ascii_lowercase().as_str() {
            "javascript" | "typescript" | "node" | "nodejs" => LanguageHook::Node,
            "python" => LanguageHook::Python,
            "go" | "golang" => LanguageHook::Go,
            "rust" => LanguageHook::Rust,
            "java" | "kotlin" => LanguageHook::Java,
            "csharp" | "dotnet" | "fsharp" => LanguageHook::DotNet,
            _ => LanguageHook::Generic,
        }
    }

    /// Runs the hook in `project_dir`.
    pub async fn run(
        &self,
        executor: &dyn CommandExecutor,
        project_dir: &Path,
        timeout: Duration,
    ) -> HookReport {
        info!("Running {:?} pre-build hook in {}", self, project_dir.display());
        let runner = HookRunner {
            executor,
            dir: project_dir,
            timeout,
        };
        let report = match self {
            LanguageHook::Node => runner.node().await,
            LanguageHook::Python => runner.python().await,
            LanguageHook::Go => runner.go().await,
            LanguageHook::Rust => runner.rust().await,
            LanguageHook::Java => runner.java().await,
            LanguageHook::DotNet => runner.dotnet().await,
            LanguageHook::Generic => runner.generic(),
        };
        debug!("Pre-build hook report: {:?}", report);
        report
    }
}

struct HookRunner<'a> {
    executor: &'a dyn CommandExecutor,
    dir: &'a Path,
    timeout: Duration,
}

impl HookRunner<'_> {
    async fn probe(&self, program: &str, args: &[&str]) -> Probe {
        let request =
            CommandRequest::program(program, args.iter().copied(), self.dir, self.timeout);
        match self.executor.execute(&request).await {
            Ok(output) => Probe::Ran(output),
            Err(e) => {
                debug!("Toolchain probe `{}` unavailable: {}", request.display(), e);
                Probe::Unavailable
            }
        }
    }

    fn has(&self, file: &str) -> bool {
        self.dir.join(file).exists()
    }

    async fn node(&self) -> HookReport {
        let mut report = HookReport::new();
        match self.probe("node", &["--version"]).await {
            Probe::Ran(out) if out.success() => {
                report.note(format!("Node.js version: {}", out.stdout.trim()))
            }
            Probe::Ran(_) => report.note("Warning: Node.js not found"),
            Probe::Unavailable => report.note("Warning: Node.js not installed"),
        }
        if self.has("package.json") {
            if !self.has("node_modules") {
                report.note("node_modules directory missing - will install dependencies");
            }
            if let Probe::Ran(out) = self.probe("npm", &["audit", "--audit-level=moderate"]).await
            {
                if !out.success() {
                    report.note("Warning: npm audit found vulnerabilities");
                }
            }
        }
        report
    }

    async fn python(&self) -> HookReport {
        let mut report = HookReport::new();
        match self.probe("python3", &["--version"]).await {
            Probe::Ran(out) if out.success() => {
                // Python 2 prints its version on stderr.
                let version = if out.stdout.trim().is_empty() {
                    out.stderr.trim()
                } else {
                    out.stdout.trim()
                };
                report.note(format!("Python version: {}", version));
            }
            _ => report.note("Warning: Python not found"),
        }
        if std::env::var_os("VIRTUAL_ENV").is_some() {
            report.note("Virtual environment detected");
        } else {
            report.note("Warning: No virtual environment detected");
        }

        let found: Vec<_> = ["requirements.txt", "pyproject.toml", "Pipfile", "poetry.lock"]
            .into_iter()
            .filter(|f| self.has(f))
            .collect();
        if found.is_empty() {
            report.note("Warning: No dependency files found");
        } else {
            report.note(format!("Found dependency files: {}", found.join(", ")));
        }

        let pycache = WalkDir::new(self.dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir() && e.file_name() == "__pycache__")
            .count();
        if pycache > 0 {
            report.note(format!("Found {} __pycache__ directories", pycache));
        }
        report
    }

    async fn go(&self) -> HookReport {
        let mut report = HookReport::new();
        match self.probe("go", &["version"]).await {
            Probe::Ran(out) if out.success() => {
                report.note(format!("Go version: {}", out.stdout.trim()))
            }
            Probe::Ran(_) => return report.fail("Error: Go not found"),
            Probe::Unavailable => return report.fail("Error: Go not installed"),
        }
        if self.has("go.mod") {
            report.note("Found go.mod file");
            if let Probe::Ran(out) = self.probe("go", &["list", "-m", "all"]).await {
                if out.success() {
                    let deps = out.stdout.lines().filter(|l| !l.trim().is_empty()).count();
                    report.note(format!("Found {} dependencies", deps));
                }
            }
        } else {
            report.note("Warning: No go.mod file found");
        }
        report
    }

    async fn rust(&self) -> HookReport {
        let mut report = HookReport::new();
        match self.probe("rustc", &["--version"]).await {
            Probe::Ran(out) if out.success() => {
                report.note(format!("Rust version: {}", out.stdout.trim()))
            }
            Probe::Ran(_) => report.note("Warning: rustc returned an error"),
            Probe::Unavailable => return report.fail("Error: Rust not installed"),
        }
        if self.has("Cargo.toml") {
            report.note("Found Cargo.toml file");
            let target = self.dir.join("target");
            if target.is_dir() {
                let size_mb = dir_size_mb(&target);
                report.note(format!("Target directory size: {:.1} MB", size_mb));
                if size_mb > LARGE_TARGET_DIR_MB {
                    report.note("Warning: Large target directory - consider cleaning");
                }
            }
        } else {
            report.note("Warning: No Cargo.toml file found");
        }
        report
    }

    async fn java(&self) -> HookReport {
        let mut report = HookReport::new();
        match self.probe("java", &["-version"]).await {
            Probe::Ran(out) if out.success() => {
                // `java -version` reports on stderr.
                let first = out.stderr.lines().next().unwrap_or_default().trim();
                report.note(format!("Java version: {}", first));
            }
            Probe::Ran(_) => report.note("Warning: java returned an error"),
            Probe::Unavailable => return report.fail("Error: Java not installed"),
        }
        if self.has("pom.xml") {
            report.note("Found Maven project (pom.xml)");
            match self.probe("mvn", &["--version"]).await {
                Probe::Ran(out) if out.success() => report.note("Maven available"),
                _ => report.note("Warning: Maven not found"),
            }
        } else if self.has("build.gradle") || self.has("build.gradle.kts") {
            report.note("Found Gradle project");
            if self.has("gradlew") {
                report.note("Gradle wrapper found");
            } else {
                report.note("Warning: No Gradle wrapper found");
            }
        }
        report
    }

    async fn dotnet(&self) -> HookReport {
        let mut report = HookReport::new();
        match self.probe("dotnet", &["--version"]).await {
            Probe::Ran(out) if out.success() => {
                report.note(format!(".NET version: {}", out.stdout.trim()))
            }
            Probe::Ran(_) => report.note("Warning: dotnet returned an error"),
            Probe::Unavailable => return report.fail("Error: .NET not installed"),
        }
        let count_ext = |ext: &str| {
            std::fs::read_dir(self.dir)
                .map(|entries| {
                    entries
                        .filter_map(|e| e.ok())
                        .filter(|e| e.path().extension().is_some_and(|x| x == ext))
                        .count()
                })
                .unwrap_or(0)
        };
        let csproj = count_ext("csproj");
        let sln = count_ext("sln");
        if csproj > 0 {
            report.note(format!("Found {} .csproj file(s)", csproj));
        }
        if sln > 0 {
            report.note(format!("Found {} solution file(s)", sln));
        }
        if csproj == 0 && sln == 0 {
            report.note("Warning: No .NET project files found");
        }
        report
    }

    fn generic(&self) -> HookReport {
        let mut report = HookReport::new();
        let found: Vec<_> = [
            "Makefile",
            "makefile",
            "CMakeLists.txt",
            "configure",
            "build.sh",
            "build.py",
            "build.js",
        ]
        .into_iter()
        .filter(|f| self.has(f))
        .collect();
        if found.is_empty() {
            report.note("No standard build files detected");
        } else {
            report.note(format!("Found build files: {}", found.join(", ")));
        }
        report.note(format!("Project size: {:.1} MB", dir_size_mb(self.dir)));
        report
    }
}

fn dir_size_mb(path: &Path) -> f64 {
    let bytes: u64 = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum();
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::process::CommandStatus;
    use crate::core::error::UnibuildError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    /// Answers toolchain probes by program name. Unknown programs fail to spawn.
    struct Toolchain(HashMap<&'static str, (i32, &'static str)>);

    #[async_trait]
    impl CommandExecutor for Toolchain {
        async fn execute(&self, request: &CommandRequest) -> Result<CommandOutput, UnibuildError> {
            match self.0.get(request.program.as_str()) {
                Some((code, out)) => Ok(CommandOutput {
                    status: CommandStatus::Exited(*code),
                    stdout: out.to_string(),
                    stderr: String::new(),
                    duration: Duration::ZERO,
                }),
                None => Err(UnibuildError::Spawn {
                    command: request.display(),
                    working_dir: request.working_dir.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                }),
            }
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_for_language() {
        assert_eq!(LanguageHook::for_language("javascript"), LanguageHook::Node);
        assert_eq!(LanguageHook::for_language("TypeScript"), LanguageHook::Node);
        assert_eq!(LanguageHook::for_language("csharp"), LanguageHook::DotNet);
        assert_eq!(LanguageHook::for_language("cobol"), LanguageHook::Generic);
    }

    #[tokio::test]
    async fn test_missing_go_toolchain_is_an_error_status() {
        let dir = tempdir().unwrap();
        let report = LanguageHook::Go
            .run(&Toolchain(HashMap::new()), dir.path(), TIMEOUT)
            .await;
        assert_eq!(report.status, HookStatus::Error);
        assert_eq!(report.actions, vec!["Error: Go not installed"]);
    }

    #[tokio::test]
    async fn test_go_counts_dependencies() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/m").unwrap();
        let toolchain = Toolchain(HashMap::from([(
            "go",
            (0, "example.com/m\ngithub.com/pkg/errors v0.9.1\n"),
        )]));
        let report = LanguageHook::Go.run(&toolchain, dir.path(), TIMEOUT).await;
        assert_eq!(report.status, HookStatus::Success);
        assert!(report.actions.contains(&"Found go.mod file".to_string()));
        assert!(report.actions.contains(&"Found 2 dependencies".to_string()));
    }

    #[tokio::test]
    async fn test_rust_hook_notes_manifest() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        let toolchain = Toolchain(HashMap::from([("rustc", (0, "rustc 1.80.0\n"))]));
        let report = LanguageHook::Rust.run(&toolchain, dir.path(), TIMEOUT).await;
        assert_eq!(
            report.actions,
            vec!["Rust version: rustc 1.80.0", "Found Cargo.toml file"]
        );
    }

    #[tokio::test]
    async fn test_generic_hook_lists_build_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Makefile"), "all:\n").unwrap();
        let report = LanguageHook::Generic
            .run(&Toolchain(HashMap::new()), dir.path(), TIMEOUT)
            .await;
        assert_eq!(report.status, HookStatus::Success);
        assert_eq!(report.actions[0], "Found build files: Makefile");
    }
}
