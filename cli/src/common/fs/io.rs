//! # unibuild Filesystem I/O Operations
//!
//! File: cli/src/common/fs/io.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Wrappers around `std::fs` used when persisting build reports:
//! - **`ensure_dir_exists`**: Creates a directory (and parents) if missing, and
//!   rejects paths that exist but are not directories.
//! - **`write_string_to_file`**: Writes text, creating the parent directory first.
//! - **`write_json_file`**: Pretty-prints a serializable value and writes it.
//!
//! Every error carries the offending path as context.
//!
use crate::core::error::{Result, UnibuildError};
use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Ensures that a directory exists at the specified path.
///
/// # Errors
///
/// Returns an `Err` if:
/// - The path exists but is not a directory.
/// - Creating the directory fails (e.g., due to permissions).
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {:?}", path))?;
        info!("Created directory: {:?}", path);
    } else if !path.is_dir() {
        anyhow::bail!(UnibuildError::FileSystem(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    } else {
        debug!("Directory already exists: {:?}", path);
    }
    Ok(())
}

/// Writes string content to a file, overwriting it if it exists.
///
/// The parent directory is created first when necessary.
pub fn write_string_to_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        // `Path::new("report.json").parent()` is `Some("")`.
        if !parent.as_os_str().is_empty() {
            ensure_dir_exists(parent)?;
        }
    }
    fs::write(path, content).with_context(|| format!("Failed to write to file {:?}", path))?;
    debug!("Wrote content to file: {:?}", path);
    Ok(())
}

/// Serializes `value` as pretty-printed JSON and writes it to `path`.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize JSON for {:?}", path))?;
    write_string_to_file(path, &json)
}
