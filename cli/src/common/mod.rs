//! # unibuild Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Shared utility modules used by the command groups, kept apart from
//! command-specific logic (`commands::`) and core infrastructure (`core::`).
//!
//! - **`fs`**: Directory creation and report file writing.
//! - **`network`**: HTTP GET + JSON decoding for the deployment probes.
//! - **`process`**: The `CommandExecutor` seam and its `tokio::process` implementation.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::process::{CommandExecutor, CommandRequest, ShellExecutor};
//! use crate::common::fs::io;
//! ```
//!

/// Utilities for filesystem operations (report persistence).
pub mod fs;
/// HTTP helpers for health and metrics probes.
pub mod network;
/// External command execution with explicit working directories and timeouts.
pub mod process;
