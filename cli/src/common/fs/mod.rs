//! # unibuild Filesystem Utilities (`common::fs`)
//!
//! File: cli/src/common/fs/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Filesystem helpers shared by the command groups. Functionality lives in
//! submodules and is imported from them directly.
//!
//! - **`io`**: Ensuring directories exist, writing text and JSON files. Used to
//!   persist build reports.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::fs::io;
//!
//! io::ensure_dir_exists(Path::new("./reports"))?;
//! io::write_json_file(Path::new("./reports/build-results-latest.json"), &report)?;
//! ```
//!

/// Basic file I/O operations (`ensure_dir_exists`, `write_string_to_file`, `write_json_file`).
pub mod io;
