//! # unibuild Deployment Strategies
//!
//! File: cli/src/commands/deploy/strategy.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! The deployment state machines. Each strategy is an explicit state enum driven
//! by a `loop { state = match state { ... } }`; every state performs at most one
//! platform or probe call, records it as a phase, and picks the next state.
//!
//! **Blue-green**: `deploy_green` -> `health_check` -> wait
//! `switch_traffic_delay` -> `switch_traffic` -> `cleanup_blue`. A failed health
//! check or traffic switch goes to `rollback` and ends `failed`.
//!
//! **Canary**: `deploy_canary`, then for each traffic step starting at
//! `initial_traffic`: `set_canary_traffic` -> wait `increment_interval` ->
//! `monitor_metrics`. A success rate below `success_threshold` (or a failed
//! traffic change) goes to `rollback_canary` and ends `failed`. Traffic grows by
//! `traffic_increment`, capped at 100; reaching 100 ends the loop with
//! `complete_migration`.
//!
//! **Rolling**: a single `rolling_update` phase.
//!
//! ## Failure boundary
//!
//! A platform or probe returning `Err` halts the strategy at that phase and sets
//! the deployment status to `error`, with the message kept on the result. No
//! rollback is attempted in that case. Rollbacks themselves are best-effort:
//! their outcome is recorded as a phase and the status stays `failed`.
//!
use super::model::{DeploymentPhase, DeploymentResult, DeploymentStatus, PhaseName, Strategy};
use super::platform::{self, DryRunPlatform, Platform};
use super::probe::{
    HealthProbe, HttpHealthProbe, HttpMetricsProbe, MetricsProbe, StaticHealthProbe,
    StaticMetricsProbe,
};
use crate::common::process::CommandExecutor;
use crate::core::config::{EnvironmentConfig, StrategiesConfig};
use crate::core::error::Result;
use anyhow::bail;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Version label the blue-green health check targets.
const GREEN_VERSION: &str = "green";

/// Runs deployments against one platform.
pub struct Deployer {
    platform: Box<dyn Platform>,
    health: Box<dyn HealthProbe>,
    metrics: Box<dyn MetricsProbe>,
    strategies: StrategiesConfig,
    dry_run: bool,
}

enum BlueGreenState {
    DeployGreen,
    HealthCheck,
    SwitchTraffic,
    Rollback,
    CleanupBlue,
    Done(DeploymentStatus),
}

enum CanaryState {
    DeployCanary,
    SetTraffic(u8),
    Monitor(u8),
    Rollback,
    Complete,
    Done(DeploymentStatus),
}

impl Deployer {
    pub fn new(
        platform: Box<dyn Platform>,
        health: Box<dyn HealthProbe>,
        metrics: Box<dyn MetricsProbe>,
        strategies: StrategiesConfig,
    ) -> Self {
        Deployer {
            platform,
            health,
            metrics,
            strategies,
            dry_run: false,
        }
    }

    /// A deployer for `environment` using the configured platform and the
    /// environment's HTTP probes.
    pub fn for_environment(
        environment: &str,
        env_config: &EnvironmentConfig,
        strategies: &StrategiesConfig,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self> {
        let health = HttpHealthProbe::new(
            &env_config.health_url,
            strategies.blue_green.health_check_attempts,
            Duration::from_secs(strategies.blue_green.health_check_interval),
        )?;
        let metrics = HttpMetricsProbe::new(&env_config.metrics_url)?;
        Ok(Deployer::new(
            platform::for_environment(environment, env_config, strategies, executor),
            Box::new(health),
            Box::new(metrics),
            strategies.clone(),
        ))
    }

    /// A deployer that touches nothing: every platform step is simulated,
    /// probes report a healthy system and waits are skipped.
    pub fn simulated(strategies: &StrategiesConfig) -> Self {
        Deployer::new(
            Box::new(DryRunPlatform),
            Box::new(StaticHealthProbe),
            Box::new(StaticMetricsProbe::default()),
            strategies.clone(),
        )
        .dry_run()
    }

    /// Marks results as dry runs and skips all waits.
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Runs `strategy` to completion. Never fails: errors end up in the
    /// result's status.
    pub async fn deploy(&self, strategy: Strategy, environment: &str, image: &str) -> DeploymentResult {
        info!("Starting {} deployment of {} to {}", strategy, image, environment);
        let mut result = DeploymentResult::new(strategy, environment, image, self.dry_run);
        let outcome = match strategy {
            Strategy::BlueGreen => self.blue_green(&mut result, environment, image).await,
            Strategy::Canary => self.canary(&mut result, image).await,
            Strategy::Rolling => self.rolling(&mut result, image).await,
        };
        match outcome {
            Ok(status) => {
                info!(
                    "{} deployment to {} finished as {:?} after {}",
                    strategy,
                    environment,
                    status,
                    result.last_phase().map_or("no phases".to_string(), |p| p.to_string())
                );
                result.finish(status);
            }
            Err(e) => {
                error!("{} deployment to {} failed: {:#}", strategy, environment, e);
                result.abort(format!("{:#}", e));
            }
        }
        if let Err(e) = validate_phase_path(strategy, result.phases()) {
            error!("Inconsistent phase log: {:#}", e);
        }
        result
    }

    async fn wait(&self, secs: u64, what: &str) {
        if self.dry_run || secs == 0 {
            return;
        }
        info!("Waiting {}s before {}", secs, what);
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    async fn blue_green(
        &self,
        result: &mut DeploymentResult,
        environment: &str,
        image: &str,
    ) -> Result<DeploymentStatus> {
        let config = &self.strategies.blue_green;
        let mut state = BlueGreenState::DeployGreen;
        loop {
            state = match state {
                BlueGreenState::DeployGreen => {
                    if result.record(self.platform.deploy_green(image).await?) {
                        BlueGreenState::HealthCheck
                    } else {
                        BlueGreenState::Done(DeploymentStatus::Failed)
                    }
                }
                BlueGreenState::HealthCheck => {
                    let report = self.health.check(environment, GREEN_VERSION).await?;
                    let within_threshold = report
                        .error_rate
                        .map_or(true, |rate| rate <= config.rollback_threshold);
                    let passed = report.healthy && within_threshold;
                    let mut phase = DeploymentPhase::from_outcome(PhaseName::HealthCheck, passed)
                        .with("attempts", report.attempts);
                    if let Some(rate) = report.error_rate {
                        phase = phase.with("error_rate", rate);
                    }
                    if let Some(response) = report.response {
                        phase = phase.with("response", response);
                    }
                    if !report.healthy {
                        phase = phase.with("error", "Health checks failed");
                    } else if !within_threshold {
                        phase = phase.with(
                            "error",
                            format!(
                                "Error rate above rollback threshold {}",
                                config.rollback_threshold
                            ),
                        );
                    }
                    if result.record(phase) {
                        BlueGreenState::SwitchTraffic
                    } else {
                        warn!("Health checks failed, rolling back");
                        BlueGreenState::Rollback
                    }
                }
                BlueGreenState::SwitchTraffic => {
                    self.wait(config.switch_traffic_delay, "switching traffic")
                        .await;
                    if result.record(self.platform.switch_traffic().await?) {
                        BlueGreenState::CleanupBlue
                    } else {
                        warn!("Traffic switch failed, rolling back");
                        BlueGreenState::Rollback
                    }
                }
                BlueGreenState::Rollback => {
                    let phase = best_effort(PhaseName::Rollback, self.platform.rollback_green().await);
                    result.record(phase);
                    BlueGreenState::Done(DeploymentStatus::Failed)
                }
                BlueGreenState::CleanupBlue => {
                    if !result.record(self.platform.cleanup_blue().await?) {
                        warn!("Cleanup of the blue version failed; traffic is already on green");
                    }
                    BlueGreenState::Done(DeploymentStatus::Success)
                }
                BlueGreenState::Done(status) => return Ok(status),
            };
        }
    }

    async fn canary(&self, result: &mut DeploymentResult, image: &str) -> Result<DeploymentStatus> {
        let config = &self.strategies.canary;
        if config.traffic_increment <= 0 {
            bail!(
                "canary traffic_increment must be positive, got {}",
                config.traffic_increment
            );
        }
        let initial = u8::try_from(config.initial_traffic.clamp(0, 100)).unwrap_or(100);
        let environment = result.environment().to_string();

        let mut state = CanaryState::DeployCanary;
        loop {
            state = match state {
                CanaryState::DeployCanary => {
                    if !result.record(self.platform.deploy_canary(image).await?) {
                        CanaryState::Done(DeploymentStatus::Failed)
                    } else if initial < 100 {
                        CanaryState::SetTraffic(initial)
                    } else {
                        CanaryState::Complete
                    }
                }
                CanaryState::SetTraffic(traffic) => {
                    info!("Setting canary traffic to {}%", traffic);
                    if result.record(self.platform.set_canary_traffic(traffic).await?) {
                        CanaryState::Monitor(traffic)
                    } else {
                        warn!("Traffic routing failed, rolling back");
                        CanaryState::Rollback
                    }
                }
                CanaryState::Monitor(traffic) => {
                    self.wait(config.increment_interval, "sampling canary metrics")
                        .await;
                    let metrics = self.metrics.sample(&environment, traffic).await?;
                    let healthy = metrics.success_rate >= config.success_threshold;
                    let phase = DeploymentPhase::from_outcome(PhaseName::MonitorMetrics, healthy)
                        .with("traffic_percent", traffic)
                        .with("success_rate", metrics.success_rate)
                        .with("error_rate", metrics.error_rate())
                        .with("response_time_p95", metrics.response_time_p95)
                        .with("request_count", metrics.request_count);
                    result.record(phase);
                    if !healthy {
                        warn!(
                            "Success rate {:.2}% below threshold {:.2}%",
                            metrics.success_rate * 100.0,
                            config.success_threshold * 100.0
                        );
                        CanaryState::Rollback
                    } else {
                        let next = next_traffic(traffic, config.traffic_increment);
                        if next < 100 {
                            CanaryState::SetTraffic(next)
                        } else {
                            CanaryState::Complete
                        }
                    }
                }
                CanaryState::Rollback => {
                    let phase =
                        best_effort(PhaseName::RollbackCanary, self.platform.rollback_canary().await);
                    result.record(phase);
                    CanaryState::Done(DeploymentStatus::Failed)
                }
                CanaryState::Complete => {
                    info!("Canary successful, completing migration");
                    if result.record(self.platform.complete_migration(image).await?) {
                        CanaryState::Done(DeploymentStatus::Success)
                    } else {
                        CanaryState::Done(DeploymentStatus::Failed)
                    }
                }
                CanaryState::Done(status) => return Ok(status),
            };
        }
    }

    async fn rolling(&self, result: &mut DeploymentResult, image: &str) -> Result<DeploymentStatus> {
        Ok(if result.record(self.platform.rolling_update(image).await?) {
            DeploymentStatus::Success
        } else {
            DeploymentStatus::Failed
        })
    }
}

/// Next canary traffic step, capped at 100.
pub fn next_traffic(current: u8, increment: i64) -> u8 {
    let next = i64::from(current).saturating_add(increment.max(1)).min(100);
    u8::try_from(next).unwrap_or(100)
}

/// A rollback error is recorded as a failed rollback phase rather than
/// replacing the failure that caused the rollback.
fn best_effort(phase: PhaseName, outcome: Result<DeploymentPhase>) -> DeploymentPhase {
    outcome.unwrap_or_else(|e| {
        error!("{} failed: {:#}", phase, e);
        DeploymentPhase::failed(phase, format!("{:#}", e))
    })
}

/// Checks that `phases`, read in order, is a path through `strategy`'s state
/// machine. A path may stop early (a deployment halted by an error) but may
/// not continue past a terminal phase. Canary traffic must not decrease and
/// must stay within 0..=100.
pub fn validate_phase_path(strategy: Strategy, phases: &[DeploymentPhase]) -> Result<()> {
    use PhaseName::*;

    let mut previous: Option<&DeploymentPhase> = None;
    let mut last_traffic: Option<u64> = None;
    for (index, phase) in phases.iter().enumerate() {
        let allowed: &[PhaseName] = match (strategy, previous.map(|p| (p.phase, p.success))) {
            (Strategy::BlueGreen, None) => &[DeployGreen],
            (Strategy::BlueGreen, Some((DeployGreen, true))) => &[HealthCheck],
            (Strategy::BlueGreen, Some((HealthCheck, true))) => &[SwitchTraffic],
            (Strategy::BlueGreen, Some((HealthCheck, false))) => &[Rollback],
            (Strategy::BlueGreen, Some((SwitchTraffic, true))) => &[CleanupBlue],
            (Strategy::BlueGreen, Some((SwitchTraffic, false))) => &[Rollback],

            (Strategy::Canary, None) => &[DeployCanary],
            (Strategy::Canary, Some((DeployCanary, true))) => &[SetCanaryTraffic, CompleteMigration],
            (Strategy::Canary, Some((SetCanaryTraffic, true))) => &[MonitorMetrics],
            (Strategy::Canary, Some((SetCanaryTraffic, false))) => &[RollbackCanary],
            (Strategy::Canary, Some((MonitorMetrics, true))) => {
                &[SetCanaryTraffic, CompleteMigration]
            }
            (Strategy::Canary, Some((MonitorMetrics, false))) => &[RollbackCanary],

            (Strategy::Rolling, None) => &[RollingUpdate],
            _ => &[],
        };
        if !allowed.contains(&phase.phase) {
            bail!(
                "phase {} ({}) is not a valid step after {} in a {} deployment",
                index,
                phase.phase,
                previous.map_or("the start".to_string(), |p| p.phase.to_string()),
                strategy
            );
        }
        if phase.phase == SetCanaryTraffic {
            let traffic = phase.detail("traffic_percent").and_then(Value::as_u64);
            match (traffic, last_traffic) {
                (None, _) => bail!("phase {} has no traffic_percent", index),
                (Some(t), _) if t > 100 => bail!("canary traffic {}% is above 100%", t),
                (Some(t), Some(last)) if t < last => {
                    bail!("canary traffic decreased from {}% to {}%", last, t)
                }
                (Some(t), _) => last_traffic = Some(t),
            }
        }
        previous = Some(phase);
    }
    Ok(())
}
