//! # unibuild Deployment Model
//!
//! File: cli/src/commands/deploy/model.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Data types shared by the deployment strategies, platforms and probes:
//!
//! - `Strategy`: blue-green, canary or rolling.
//! - `PhaseName`: every discrete step a strategy can log.
//! - `DeploymentPhase`: one logged step with its success flag and a free-form
//!   JSON payload (image, traffic percentage, metrics, error text, ...).
//! - `DeploymentResult`: the append-only phase log of one deployment plus its
//!   status. The status leaves `in_progress` exactly once.
//!
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{info, warn};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    BlueGreen,
    Canary,
    Rolling,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::BlueGreen => "blue-green",
            Strategy::Canary => "canary",
            Strategy::Rolling => "rolling",
        })
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    DeployGreen,
    HealthCheck,
    SwitchTraffic,
    /// Undo of the green deployment.
    Rollback,
    CleanupBlue,
    DeployCanary,
    SetCanaryTraffic,
    MonitorMetrics,
    RollbackCanary,
    CompleteMigration,
    RollingUpdate,
}

impl PhaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::DeployGreen => "deploy_green",
            PhaseName::HealthCheck => "health_check",
            PhaseName::SwitchTraffic => "switch_traffic",
            PhaseName::Rollback => "rollback",
            PhaseName::CleanupBlue => "cleanup_blue",
            PhaseName::DeployCanary => "deploy_canary",
            PhaseName::SetCanaryTraffic => "set_canary_traffic",
            PhaseName::MonitorMetrics => "monitor_metrics",
            PhaseName::RollbackCanary => "rollback_canary",
            PhaseName::CompleteMigration => "complete_migration",
            PhaseName::RollingUpdate => "rolling_update",
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DeploymentPhase {
    pub phase: PhaseName,
    pub success: bool,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl DeploymentPhase {
    pub fn succeeded(phase: PhaseName) -> Self {
        DeploymentPhase {
            phase,
            success: true,
            details: Map::new(),
        }
    }

    pub fn failed(phase: PhaseName, error: impl Into<String>) -> Self {
        DeploymentPhase {
            phase,
            success: false,
            details: Map::new(),
        }
        .with("error", error.into())
    }

    /// Sets `success` from a boolean outcome.
    pub fn from_outcome(phase: PhaseName, success: bool) -> Self {
        DeploymentPhase {
            phase,
            success,
            details: Map::new(),
        }
    }

    /// Adds a payload entry.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    InProgress,
    Success,
    Failed,
    /// An unanticipated error halted the strategy.
    Error,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DeploymentResult {
    strategy: Strategy,
    environment: String,
    image: String,
    dry_run: bool,
    status: DeploymentStatus,
    phases: Vec<DeploymentPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DeploymentResult {
    pub fn new(strategy: Strategy, environment: &str, image: &str, dry_run: bool) -> Self {
        DeploymentResult {
            strategy,
            environment: environment.to_string(),
            image: image.to_string(),
            dry_run,
            status: DeploymentStatus::InProgress,
            phases: Vec::new(),
            error: None,
        }
    }

    /// Appends a phase and returns whether it succeeded.
    pub fn record(&mut self, phase: DeploymentPhase) -> bool {
        info!(
            "Phase {} {}",
            phase.phase,
            if phase.success { "succeeded" } else { "failed" }
        );
        let success = phase.success;
        self.phases.push(phase);
        success
    }

    /// Sets the terminal status. Later calls are ignored.
    pub fn finish(&mut self, status: DeploymentStatus) {
        if self.status != DeploymentStatus::InProgress {
            warn!(
                "Deployment already finished as {:?}; ignoring {:?}",
                self.status, status
            );
            return;
        }
        self.status = status;
    }

    /// Terminates with `error`, keeping the message.
    pub fn abort(&mut self, error: String) {
        if self.status == DeploymentStatus::InProgress {
            self.error = Some(error);
        }
        self.finish(DeploymentStatus::Error);
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn status(&self) -> DeploymentStatus {
        self.status
    }

    pub fn phases(&self) -> &[DeploymentPhase] {
        &self.phases
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_phase(&self) -> Option<PhaseName> {
        self.phases.last().map(|p| p.phase)
    }
}
