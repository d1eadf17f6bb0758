//! # unibuild Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module aggregates the core infrastructure components shared by the
//! `build` and `deploy` command groups:
//! - `config`: Language registry and deployment configuration loading and validation
//! - `error`: Error types and the `Result` alias
//! - `templating`: Rendering of the Kubernetes documents used by deployments
//!
//! ## Usage
//!
//! ```rust
//! use crate::core::config; // For loading configuration
//! use crate::core::error::{Result, UnibuildError}; // For error handling
//! use crate::core::templating; // For manifest rendering
//! ```
//!
pub mod config;
pub mod error;
pub mod templating;
