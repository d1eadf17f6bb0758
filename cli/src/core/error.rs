//! # unibuild Error Types
//!
//! File: cli/src/core/error.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module defines the error types used throughout unibuild. Most failures
//! in this application are *data*, not errors: a failing build command is
//! recorded in an `OperationResult`, a failing deployment phase is recorded in
//! a `DeploymentPhase`. The types here cover the remaining cases, the ones that
//! are caught at a documented boundary and converted into data there:
//!
//! - A single project build (`Orchestrator::build_project`) converts any error
//!   into the project's `error` status.
//! - A single deployment phase converts any error into the deployment's `error`
//!   status and halts the strategy.
//!
//! Errors that escape those boundaries (bad configuration, unreadable report
//! directory) reach `main` and terminate the process with a non-zero exit code.
//!
//! ## Architecture
//!
//! - `UnibuildError`: a `thiserror` enum with one variant per failure domain.
//! - `Result<T>`: alias for `anyhow::Result<T>` for context-rich propagation.
//!
//! ## Examples
//!
//! ```rust
//! if !path.is_dir() {
//!     return Err(UnibuildError::ProjectDirectory {
//!         path: path.to_path_buf(),
//!         reason: "not a directory".into(),
//!     })?;
//! }
//!
//! let content = fs::read_to_string(&path)
//!     .with_context(|| format!("Failed to read file: {}", path.display()))?;
//! ```
//!
use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for the unibuild application.
#[derive(Error, Debug)]
pub enum UnibuildError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Filesystem error: {0}")]
    FileSystem(String),

    /// The project directory could not be used as a working directory.
    #[error("Project directory '{}' is unavailable: {reason}", path.display())]
    ProjectDirectory { path: PathBuf, reason: String },

    /// The command could not be started at all (as opposed to exiting non-zero).
    #[error("Failed to spawn '{command}' in '{}': {source}", working_dir.display())]
    Spawn {
        command: String,
        working_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template rendering error: {source}")]
    Template {
        #[from]
        source: tera::Error,
    },

    #[error("HTTP probe failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("Probe returned an unexpected response: {0}")]
    ProbeResponse(String),

    #[error("Unknown deployment environment '{name}'. Known environments: {known}")]
    UnknownEnvironment { name: String, known: String },
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = UnibuildError::Config("traffic_increment must be positive".to_string());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: traffic_increment must be positive"
        );

        let dir_err = UnibuildError::ProjectDirectory {
            path: PathBuf::from("/tmp/gone"),
            reason: "not found".into(),
        };
        assert_eq!(
            dir_err.to_string(),
            "Project directory '/tmp/gone' is unavailable: not found"
        );

        let env_err = UnibuildError::UnknownEnvironment {
            name: "qa".into(),
            known: "production, staging".into(),
        };
        assert!(env_err.to_string().contains("'qa'"));
        assert!(env_err.to_string().contains("production, staging"));
    }

    #[test]
    fn test_spawn_error_keeps_source() {
        let err = UnibuildError::Spawn {
            command: "npm ci".into(),
            working_dir: PathBuf::from("/srv/app"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        };
        assert!(err.to_string().contains("npm ci"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
