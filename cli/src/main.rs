//! # unibuild Main Entry Point
//!
//! File: cli/src/main.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This file serves as the main entry point for the unibuild CLI application.
//! It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Routing execution to the `build` or `deploy` handler
//! - Mapping the outcome to the process exit status
//!
//! ## Exit status
//!
//! - `0`: the command completed and everything succeeded
//! - `1`: a project failed, a deployment did not succeed, or an error occurred
//! - `130`: interrupted with Ctrl-C
//!
//! ## Examples
//!
//! ```bash
//! # Get help
//! unibuild --help
//!
//! # Build with info-level logging
//! unibuild -v build --path ./services
//! ```
//!
//! Command processing flow:
//! 1. Parse command-line args via Clap
//! 2. Configure logging based on verbosity level
//! 3. Route to the command handler, racing it against Ctrl-C
//! 4. Format and display any errors that occur
//!
use clap::Parser;
use commands::CommandOutcome;
use tracing_subscriber::{fmt, EnvFilter};

mod commands; // build and deploy command groups
mod common; // Shared utilities (fs, network, process)
mod core; // Core infrastructure (errors, config, templating)

/// Exit status after Ctrl-C (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Defines the top-level command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "unibuild",
    about = "Universal multi-language build orchestrator and deployment driver",
    long_about = "Detects projects of any registered language under a directory tree, builds them in parallel,\n\
                  and rolls container images out with blue-green, canary or rolling strategies.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Parser, Debug)]
enum Commands {
    #[command(alias = "b")]
    Build(commands::build::BuildArgs),
    #[command(alias = "d")]
    Deploy(commands::deploy::DeployArgs),
}

fn main() {
    let code = run();
    // The runtime is gone at this point, so every spawned build task has been
    // dropped and its child processes killed.
    std::process::exit(code);
}

#[tokio::main]
async fn run() -> i32 {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command = async {
        match cli.command {
            Commands::Build(args) => commands::build::handle_build(args).await,
            Commands::Deploy(args) => commands::deploy::handle_deploy(args).await,
        }
    };

    let command_result = tokio::select! {
        result = command => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; terminating in-flight commands.");
            eprintln!("Interrupted");
            return INTERRUPTED_EXIT_CODE;
        }
    };

    match command_result {
        Ok(CommandOutcome::Success) => 0,
        Ok(CommandOutcome::Failure) => 1,
        Err(e) => {
            tracing::error!("Command execution failed: {:?}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}
