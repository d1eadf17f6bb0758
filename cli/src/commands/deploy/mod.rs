//! # unibuild Deploy Command (`unibuild deploy`)
//!
//! File: cli/src/commands/deploy/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Rolls a container image out to a configured environment with one of three
//! strategies and prints the resulting phase log as JSON on stdout.
//!
//! ## Architecture
//!
//! - `model`: Strategies, phase names and the `DeploymentResult` log.
//! - `platform`: The `Platform` trait with Kubernetes, generic and dry-run implementations.
//! - `probe`: Health and canary metrics probes.
//! - `strategy`: The `Deployer` and its per-strategy state machines.
//!
//! ## Examples
//!
//! ```bash
//! # Canary rollout to production
//! unibuild deploy -e production -s canary -i registry.example.com/shop:1.4.2
//!
//! # Show what a blue-green rollout would do, without touching the cluster
//! unibuild deploy -e staging -s blue-green -i shop:1.4.2 --dry-run
//! ```
//!
//! The exit status is non-zero unless the deployment ended `success`.
//!
use super::CommandOutcome;
use crate::common::process::ShellExecutor;
use crate::core::config;
use crate::core::error::Result;
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod model;
pub mod platform;
pub mod probe;
pub mod strategy;

use model::{DeploymentStatus, Strategy};
use strategy::Deployer;

/// # Deploy Arguments (`DeployArgs`)
#[derive(Parser, Debug)]
pub struct DeployArgs {
    /// Target environment, as named in the deployment configuration.
    #[arg(short, long)]
    environment: String,

    /// Rollout strategy.
    #[arg(short, long, value_enum)]
    strategy: Strategy,

    /// Container image to deploy.
    #[arg(short, long)]
    image: String,

    /// Path to the deployment configuration (`deploy.toml`).
    #[arg(short, long, env = "UNIBUILD_DEPLOY_CONFIG")]
    config: Option<String>,

    /// Simulate every step instead of performing it.
    #[arg(long)]
    dry_run: bool,
}

/// # Handle Deploy Command (`handle_deploy`)
///
/// Loads the deployment configuration, resolves the environment, runs the
/// strategy and prints the result.
///
/// ## Returns
///
/// * `Ok(CommandOutcome::Success)` only for a `success` deployment.
/// * `Err` for configuration problems (unreadable or invalid file, unknown
///   environment). No phase has run in that case.
pub async fn handle_deploy(args: DeployArgs) -> Result<CommandOutcome> {
    debug!("Deploy args: {:?}", args);
    let deploy_config = config::load_deploy_config(args.config.as_deref())?;
    let env_config = config::environment(&deploy_config, &args.environment)?;

    let deployer = if args.dry_run {
        info!("Dry run: no changes will be made to {}", args.environment);
        Deployer::simulated(&deploy_config.strategies)
    } else {
        Deployer::for_environment(
            &args.environment,
            env_config,
            &deploy_config.strategies,
            Arc::new(ShellExecutor),
        )?
    };

    let result = deployer
        .deploy(args.strategy, &args.environment, &args.image)
        .await;
    let rendered =
        serde_json::to_string_pretty(&result).context("Failed to serialize deployment result")?;
    println!("{}", rendered);
    if let Some(message) = result.error() {
        error!("Deployment to {} aborted: {}", args.environment, message);
        eprintln!("Error: {}", message);
    }

    Ok(if result.status() == DeploymentStatus::Success {
        CommandOutcome::Success
    } else {
        CommandOutcome::Failure
    })
}
