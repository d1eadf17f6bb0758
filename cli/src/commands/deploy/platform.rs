//! # unibuild Deployment Platforms
//!
//! File: cli/src/commands/deploy/platform.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! A `Platform` carries out the individual steps the deployment strategies ask
//! for (deploy the green version, switch traffic, roll back, ...). Each step
//! returns a `DeploymentPhase`:
//!
//! - `Ok(phase)` with `success = true/false` for anticipated outcomes, such as
//!   `kubectl` exiting non-zero or not being installed.
//! - `Err` only for failures inside unibuild itself (e.g. a manifest that cannot
//!   be rendered). The strategy then halts with status `error`.
//!
//! ## Implementations
//!
//! - `KubernetesPlatform`: drives `kubectl` in the environment's namespace. The
//!   application runs as `deployment/<env>-app` behind `service/<env>-service`;
//!   the canary runs as `deployment/<env>-canary`.
//! - `GenericPlatform`: environments without orchestrator integration. Every
//!   step succeeds and is recorded with `method = "generic"`.
//! - `DryRunPlatform`: logs what would be done and touches nothing.
//!
//! Canary traffic weights are recorded but not enforced by any platform; real
//! traffic shaping belongs to the ingress or service mesh in front of the
//! environment.
//!
use super::model::{DeploymentPhase, PhaseName};
use crate::common::process::{CommandExecutor, CommandOutput, CommandRequest};
use crate::core::config::{EnvironmentConfig, EnvironmentKind, StrategiesConfig};
use crate::core::error::Result;
use crate::core::templating::{self, CanaryManifest};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timeout for `kubectl` calls that do not wait on a rollout.
const KUBECTL_TIMEOUT: Duration = Duration::from_secs(120);
/// Extra time granted to the process on top of `kubectl rollout status --timeout`.
const ROLLOUT_GRACE: Duration = Duration::from_secs(30);
/// Replica count of the canary deployment.
const CANARY_REPLICAS: u32 = 1;

#[async_trait]
pub trait Platform: Send + Sync {
    async fn deploy_green(&self, image: &str) -> Result<DeploymentPhase>;
    async fn switch_traffic(&self) -> Result<DeploymentPhase>;
    /// Undoes `deploy_green`. Logged as the `rollback` phase.
    async fn rollback_green(&self) -> Result<DeploymentPhase>;
    async fn cleanup_blue(&self) -> Result<DeploymentPhase>;
    async fn deploy_canary(&self, image: &str) -> Result<DeploymentPhase>;
    async fn set_canary_traffic(&self, percent: u8) -> Result<DeploymentPhase>;
    async fn rollback_canary(&self) -> Result<DeploymentPhase>;
    /// Promotes the canary image to the main deployment.
    async fn complete_migration(&self, image: &str) -> Result<DeploymentPhase>;
    async fn rolling_update(&self, image: &str) -> Result<DeploymentPhase>;
}

/// Chooses the platform for an environment.
pub fn for_environment(
    environment: &str,
    env_config: &EnvironmentConfig,
    strategies: &StrategiesConfig,
    executor: Arc<dyn CommandExecutor>,
) -> Box<dyn Platform> {
    match env_config.kind {
        EnvironmentKind::Kubernetes => Box::new(KubernetesPlatform {
            environment: environment.to_string(),
            namespace: env_config.namespace_or(environment).to_string(),
            replicas: env_config.replicas,
            green_rollout_timeout: Duration::from_secs(strategies.blue_green.rollout_timeout),
            rolling_rollout_timeout: Duration::from_secs(strategies.rolling.rollout_timeout),
            executor,
        }),
        EnvironmentKind::Generic => Box::new(GenericPlatform),
    }
}

// --- Kubernetes ----------------------------------------------------------------

pub struct KubernetesPlatform {
    environment: String,
    namespace: String,
    replicas: u32,
    green_rollout_timeout: Duration,
    rolling_rollout_timeout: Duration,
    executor: Arc<dyn CommandExecutor>,
}

impl KubernetesPlatform {
    fn app_deployment(&self) -> String {
        format!("deployment/{}-app", self.environment)
    }

    fn canary_deployment(&self) -> String {
        format!("{}-canary", self.environment)
    }

    fn namespace_arg(&self) -> String {
        format!("--namespace={}", self.namespace)
    }

    /// Runs `kubectl`. A non-zero exit or a missing binary becomes `Err` with
    /// the failed phase to return.
    async fn kubectl(
        &self,
        phase: PhaseName,
        args: Vec<String>,
        stdin: Option<String>,
        timeout: Duration,
    ) -> std::result::Result<CommandOutput, DeploymentPhase> {
        let mut request = CommandRequest::program("kubectl", args, Path::new("."), timeout);
        if let Some(input) = stdin {
            request = request.with_stdin(input);
        }
        debug!("{}: {}", phase, request.display());
        match self.executor.execute(&request).await {
            Ok(output) if output.success() => Ok(output),
            Ok(output) => {
                warn!("`{}` failed: {}", request.display(), output.stderr.trim());
                let message = if output.timed_out() {
                    format!("`{}` timed out", request.display())
                } else {
                    output.stderr.trim().to_string()
                };
                Err(DeploymentPhase::failed(phase, message)
                    .with("command", request.display())
                    .with("method", "kubernetes"))
            }
            Err(e) => Err(DeploymentPhase::failed(phase, e.to_string()).with("method", "kubernetes")),
        }
    }

    /// `kubectl set image` followed by `kubectl rollout status`.
    async fn update_app_image(
        &self,
        phase: PhaseName,
        image: &str,
        rollout_timeout: Duration,
    ) -> std::result::Result<(), DeploymentPhase> {
        self.kubectl(
            phase,
            vec![
                "set".into(),
                "image".into(),
                self.app_deployment(),
                format!("app={}", image),
                self.namespace_arg(),
            ],
            None,
            KUBECTL_TIMEOUT,
        )
        .await?;
        self.kubectl(
            phase,
            vec![
                "rollout".into(),
                "status".into(),
                self.app_deployment(),
                self.namespace_arg(),
                format!("--timeout={}s", rollout_timeout.as_secs()),
            ],
            None,
            rollout_timeout + ROLLOUT_GRACE,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Platform for KubernetesPlatform {
    async fn deploy_green(&self, image: &str) -> Result<DeploymentPhase> {
        let phase = PhaseName::DeployGreen;
        Ok(
            match self
                .update_app_image(phase, image, self.green_rollout_timeout)
                .await
            {
                Ok(()) => DeploymentPhase::succeeded(phase)
                    .with("image", image)
                    .with("replicas", self.replicas)
                    .with("method", "kubernetes"),
                Err(failed) => failed.with("image", image),
            },
        )
    }

    async fn switch_traffic(&self) -> Result<DeploymentPhase> {
        let phase = PhaseName::SwitchTraffic;
        let patch = templating::render_selector_patch("green")?;
        let args = vec![
            "patch".into(),
            "service".into(),
            format!("{}-service", self.environment),
            "-p".into(),
            patch,
            self.namespace_arg(),
        ];
        Ok(match self.kubectl(phase, args, None, KUBECTL_TIMEOUT).await {
            Ok(_) => DeploymentPhase::succeeded(phase).with("method", "kubernetes_service"),
            Err(failed) => failed,
        })
    }

    async fn rollback_green(&self) -> Result<DeploymentPhase> {
        let phase = PhaseName::Rollback;
        let args = vec![
            "rollout".into(),
            "undo".into(),
            self.app_deployment(),
            self.namespace_arg(),
        ];
        Ok(match self.kubectl(phase, args, None, KUBECTL_TIMEOUT).await {
            Ok(_) => DeploymentPhase::succeeded(phase).with("method", "kubernetes_rollback"),
            Err(failed) => failed,
        })
    }

    async fn cleanup_blue(&self) -> Result<DeploymentPhase> {
        // The rollout has already replaced the blue pods.
        info!("Blue version of {} retired by the rollout", self.environment);
        Ok(DeploymentPhase::succeeded(PhaseName::CleanupBlue).with("method", "kubernetes"))
    }

    async fn deploy_canary(&self, image: &str) -> Result<DeploymentPhase> {
        let phase = PhaseName::DeployCanary;
        let manifest = templating::render_canary_manifest(&CanaryManifest {
            environment: &self.environment,
            namespace: &self.namespace,
            image,
            replicas: CANARY_REPLICAS,
        })?;
        let args = vec!["apply".into(), "-f".into(), "-".into()];
        Ok(
            match self.kubectl(phase, args, Some(manifest), KUBECTL_TIMEOUT).await {
                Ok(_) => DeploymentPhase::succeeded(phase)
                    .with("image", image)
                    .with("method", "kubernetes"),
                Err(failed) => failed.with("image", image),
            },
        )
    }

    async fn set_canary_traffic(&self, percent: u8) -> Result<DeploymentPhase> {
        info!("Setting {}% traffic to canary", percent);
        Ok(DeploymentPhase::succeeded(PhaseName::SetCanaryTraffic)
            .with("traffic_percent", percent)
            .with("method", "generic"))
    }

    async fn rollback_canary(&self) -> Result<DeploymentPhase> {
        let phase = PhaseName::RollbackCanary;
        let args = vec![
            "delete".into(),
            "deployment".into(),
            self.canary_deployment(),
            self.namespace_arg(),
            "--ignore-not-found".into(),
        ];
        Ok(match self.kubectl(phase, args, None, KUBECTL_TIMEOUT).await {
            Ok(_) => DeploymentPhase::succeeded(phase).with("method", "kubernetes"),
            Err(failed) => failed,
        })
    }

    async fn complete_migration(&self, image: &str) -> Result<DeploymentPhase> {
        let phase = PhaseName::CompleteMigration;
        if let Err(failed) = self
            .update_app_image(phase, image, self.rolling_rollout_timeout)
            .await
        {
            return Ok(failed.with("image", image));
        }
        let args = vec![
            "delete".into(),
            "deployment".into(),
            self.canary_deployment(),
            self.namespace_arg(),
            "--ignore-not-found".into(),
        ];
        Ok(match self.kubectl(phase, args, None, KUBECTL_TIMEOUT).await {
            Ok(_) => DeploymentPhase::succeeded(phase)
                .with("image", image)
                .with("method", "kubernetes"),
            Err(failed) => failed.with("image", image),
        })
    }

    async fn rolling_update(&self, image: &str) -> Result<DeploymentPhase> {
        let phase = PhaseName::RollingUpdate;
        Ok(
            match self
                .update_app_image(phase, image, self.rolling_rollout_timeout)
                .await
            {
                Ok(()) => DeploymentPhase::succeeded(phase)
                    .with("image", image)
                    .with("method", "kubernetes"),
                Err(failed) => failed.with("image", image),
            },
        )
    }
}

// --- Generic and dry run ---------------------------------------------------------

/// For environments without orchestrator integration.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericPlatform;

#[async_trait]
impl Platform for GenericPlatform {
    async fn deploy_green(&self, image: &str) -> Result<DeploymentPhase> {
        Ok(generic(PhaseName::DeployGreen).with("image", image))
    }
    async fn switch_traffic(&self) -> Result<DeploymentPhase> {
        Ok(generic(PhaseName::SwitchTraffic))
    }
    async fn rollback_green(&self) -> Result<DeploymentPhase> {
        Ok(generic(PhaseName::Rollback))
    }
    async fn cleanup_blue(&self) -> Result<DeploymentPhase> {
        Ok(generic(PhaseName::CleanupBlue))
    }
    async fn deploy_canary(&self, image: &str) -> Result<DeploymentPhase> {
        Ok(generic(PhaseName::DeployCanary).with("image", image))
    }
    async fn set_canary_traffic(&self, percent: u8) -> Result<DeploymentPhase> {
        Ok(generic(PhaseName::SetCanaryTraffic).with("traffic_percent", percent))
    }
    async fn rollback_canary(&self) -> Result<DeploymentPhase> {
        Ok(generic(PhaseName::RollbackCanary))
    }
    async fn complete_migration(&self, image: &str) -> Result<DeploymentPhase> {
        Ok(generic(PhaseName::CompleteMigration).with("image", image))
    }
    async fn rolling_update(&self, image: &str) -> Result<DeploymentPhase> {
        Ok(generic(PhaseName::RollingUpdate).with("image", image))
    }
}

fn generic(phase: PhaseName) -> DeploymentPhase {
    debug!("{} (generic environment)", phase);
    DeploymentPhase::succeeded(phase).with("method", "generic")
}

/// Records every step as successful without performing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunPlatform;

fn dry_run(phase: PhaseName, action: String) -> DeploymentPhase {
    info!("[dry-run] {}: would {}", phase, action);
    DeploymentPhase::succeeded(phase)
        .with("method", "dry_run")
        .with("action", action)
}

#[async_trait]
impl Platform for DryRunPlatform {
    async fn deploy_green(&self, image: &str) -> Result<DeploymentPhase> {
        Ok(dry_run(PhaseName::DeployGreen, format!("deploy {} as green", image)).with("image", image))
    }
    async fn switch_traffic(&self) -> Result<DeploymentPhase> {
        Ok(dry_run(PhaseName::SwitchTraffic, "route traffic to green".to_string()))
    }
    async fn rollback_green(&self) -> Result<DeploymentPhase> {
        Ok(dry_run(PhaseName::Rollback, "undo the green rollout".to_string()))
    }
    async fn cleanup_blue(&self) -> Result<DeploymentPhase> {
        Ok(dry_run(PhaseName::CleanupBlue, "retire the blue version".to_string()))
    }
    async fn deploy_canary(&self, image: &str) -> Result<DeploymentPhase> {
        Ok(dry_run(PhaseName::DeployCanary, format!("deploy {} as canary", image)).with("image", image))
    }
    async fn set_canary_traffic(&self, percent: u8) -> Result<DeploymentPhase> {
        Ok(dry_run(PhaseName::SetCanaryTraffic, format!("route {}% of traffic to canary", percent))
            .with("traffic_percent", percent))
    }
    async fn rollback_canary(&self) -> Result<DeploymentPhase> {
        Ok(dry_run(PhaseName::RollbackCanary, "delete the canary".to_string()))
    }
    async fn complete_migration(&self, image: &str) -> Result<DeploymentPhase> {
        Ok(dry_run(PhaseName::CompleteMigration, format!("promote {}", image)).with("image", image))
    }
    async fn rolling_update(&self, image: &str) -> Result<DeploymentPhase> {
        Ok(dry_run(PhaseName::RollingUpdate, format!("roll out {}", image)).with("image", image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::process::CommandStatus;
    use crate::core::config;
    use crate::core::error::UnibuildError;
    use std::sync::Mutex;

    /// Records kubectl invocations; fails those whose arguments contain `fail_on`.
    #[derive(Default)]
    struct RecordingExecutor {
        fail_on: Option<&'static str>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn execute(
            &self,
            request: &CommandRequest,
        ) -> std::result::Result<CommandOutput, UnibuildError> {
            let line = request.display();
            self.calls
                .lock()
                .unwrap()
                .push((line.clone(), request.stdin.clone()));
            let failed = self.fail_on.is_some_and(|f| line.contains(f));
            Ok(CommandOutput {
                status: CommandStatus::Exited(if failed { 1 } else { 0 }),
                stdout: String::new(),
                stderr: if failed { "boom".into() } else { String::new() },
                duration: Duration::ZERO,
            })
        }
    }

    fn kubernetes(executor: Arc<RecordingExecutor>) -> Box<dyn Platform> {
        let cfg = config::default_deploy_config();
        let mut staging = cfg.environments["staging"].clone();
        staging.namespace = Some("stage-ns".to_string());
        for_environment("staging", &staging, &cfg.strategies, executor)
    }

    #[tokio::test]
    async fn test_deploy_green_sets_image_then_waits_for_rollout() {
        let executor = Arc::new(RecordingExecutor::default());
        let phase = kubernetes(executor.clone())
            .deploy_green("registry.local/app:2")
            .await
            .unwrap();
        assert!(phase.success);
        assert_eq!(phase.details["replicas"], 2);

        let calls = executor.calls.lock().unwrap();
        assert_eq!(
            calls[0].0,
            "kubectl set image deployment/staging-app app=registry.local/app:2 --namespace=stage-ns"
        );
        assert_eq!(
            calls[1].0,
            "kubectl rollout status deployment/staging-app --namespace=stage-ns --timeout=300s"
        );
    }

    #[tokio::test]
    async fn test_failed_kubectl_is_a_failed_phase() {
        let executor = Arc::new(RecordingExecutor {
            fail_on: Some("set image"),
            ..Default::default()
        });
        let phase = kubernetes(executor.clone()).rolling_update("app:3").await.unwrap();
        assert!(!phase.success);
        assert_eq!(phase.details["error"], "boom");
        // No rollout wait after a failed image update.
        assert_eq!(executor.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_uses_configured_namespace() {
        let executor = Arc::new(RecordingExecutor::default());
        let platform = kubernetes(executor.clone());
        platform.rollback_green().await.unwrap();
        platform.rollback_canary().await.unwrap();
        let calls = executor.calls.lock().unwrap();
        assert!(calls.iter().all(|(line, _)| line.contains("--namespace=stage-ns")));
        assert!(calls[1].0.contains("delete deployment staging-canary"));
    }

    #[tokio::test]
    async fn test_deploy_canary_applies_rendered_manifest() {
        let executor = Arc::new(RecordingExecutor::default());
        let phase = kubernetes(executor.clone()).deploy_canary("app:4").await.unwrap();
        assert!(phase.success);
        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls[0].0, "kubectl apply -f -");
        let manifest = calls[0].1.as_deref().unwrap();
        assert!(manifest.contains("name: staging-canary"));
        assert!(manifest.contains("namespace: stage-ns"));
        assert!(manifest.contains("image: app:4"));
    }

    #[tokio::test]
    async fn test_generic_environment() {
        let cfg = config::parse_deploy_config("[environments.edge]\ntype = \"generic\"").unwrap();
        let platform = for_environment(
            "edge",
            &cfg.environments["edge"],
            &cfg.strategies,
            Arc::new(RecordingExecutor::default()),
        );
        let phase = platform.set_canary_traffic(35).await.unwrap();
        assert!(phase.success);
        assert_eq!(phase.details["method"], "generic");
        assert_eq!(phase.details["traffic_percent"], 35);
    }

    #[tokio::test]
    async fn test_dry_run_records_intent() {
        let phase = DryRunPlatform.deploy_green("app:5").await.unwrap();
        assert!(phase.success);
        assert_eq!(phase.details["method"], "dry_run");
        assert_eq!(phase.details["action"], "deploy app:5 as green");
    }
}
