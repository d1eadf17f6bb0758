//! # unibuild Command Modules
//!
//! File: cli/src/commands/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module aggregates the top-level command groups of the unibuild CLI.
//! Each group defines its own arguments structure and an async handler that
//! `main.rs` dispatches to.
//!
//! ## Command Groups
//!
//! - `build`: Project detection and multi-language build orchestration
//! - `deploy`: Blue-green, canary and rolling deployments
//!

/// Command group for detecting and building projects.
pub mod build;
/// Command group for deploying container images.
pub mod deploy;

/// How a command that ran to completion went.
///
/// Handlers return `Err` for problems that prevented the command from doing
/// its work at all. A completed command whose work partly failed (a project
/// that did not build, a deployment that rolled back) returns `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Failure,
}
