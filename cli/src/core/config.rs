//! # unibuild Configuration System
//!
//! File: cli/src/core/config.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module loads and validates the two configuration files unibuild works with:
//!
//! - The **language registry** (`languages.toml`): a `[global]` section with
//!   orchestration settings and one `[languages.<id>]` table per language holding
//!   its marker files, source patterns and operation commands.
//! - The **deployment configuration** (`deploy.toml`): `[environments.<id>]` tables
//!   and per-strategy tunables under `[strategies.<name>]`.
//!
//! ## Architecture
//!
//! The two files fail differently:
//! - A missing or malformed registry is logged and replaced by an empty registry.
//!   Detection then degrades to "no projects found" instead of crashing.
//! - A missing deployment file falls back to built-in defaults, but a malformed
//!   one, or one with invalid tunables (e.g. a non-positive canary increment),
//!   is a configuration error returned to the caller. A rollout must never start
//!   from a guessed configuration.
//!
//! Registry location (first match wins):
//! 1. The path passed with `--config` (with `~` expanded).
//! 2. `./config/languages.toml` in the current directory.
//! 3. `<user config dir>/unibuild/languages.toml`.
//!
//! ## Examples
//!
//! ```rust
//! let registry_file = config::load_registry_file(args.config.as_deref());
//! let max_workers = registry_file.global.max_parallel;
//!
//! let deploy_cfg = config::load_deploy_config(Some("config/deploy.toml"))?;
//! let canary = &deploy_cfg.strategies.canary;
//! ```
//!
use crate::core::error::{Result, UnibuildError};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, warn};

/// Default registry location relative to the current directory.
pub const DEFAULT_REGISTRY_PATH: &str = "config/languages.toml";
/// Default deployment configuration location relative to the current directory.
pub const DEFAULT_DEPLOY_CONFIG_PATH: &str = "config/deploy.toml";
/// Registry file name inside the user configuration directory.
const USER_REGISTRY_FILENAME: &str = "languages.toml";

// --- Language registry -------------------------------------------------------

/// Raw contents of the language registry file.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RegistryFile {
    #[serde(default)]
    pub global: GlobalConfig,
    /// Language id -> detection signals and commands. Ordered by id so detection
    /// output is deterministic.
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageEntry>,
}

/// One `[languages.<id>]` table.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LanguageEntry {
    /// Definitive marker file names (e.g. `Cargo.toml`).
    #[serde(default)]
    pub project_files: Vec<String>,
    /// Weak source suffix patterns (e.g. `*.rs`).
    #[serde(default)]
    pub file_patterns: Vec<String>,
    /// Operation name -> shell command template.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
}

/// Orchestration settings from the `[global]` section.
///
/// The confidence values are policy, not derived quantities. They are exposed
/// here so they can be tuned per installation.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Build projects on a bounded worker pool instead of one after another.
    pub parallel_builds: bool,
    /// Worker pool size.
    pub max_parallel: usize,
    /// Confidence assigned when a definitive marker file is present.
    pub marker_confidence: f64,
    /// Confidence assigned when enough source files match a language's patterns.
    pub pattern_confidence: f64,
    /// Projects at or below this confidence are not built.
    pub min_build_confidence: f64,
    /// Minimum number of matching source files for a pattern candidate.
    pub min_pattern_files: usize,
    /// Per-command timeout.
    pub command_timeout_secs: u64,
    /// Separator between fallback alternatives in a command template.
    pub fallback_separator: String,
    /// Directory names never descended into during detection.
    pub exclude_dirs: Vec<String>,
    /// Where build reports are written.
    pub report_dir: String,
    /// Run language pre-build hooks before each project's operations.
    pub pre_build_hooks: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            parallel_builds: true,
            max_parallel: 4,
            marker_confidence: 0.9,
            pattern_confidence: 0.6,
            min_build_confidence: 0.5,
            min_pattern_files: 3,
            command_timeout_secs: 300,
            fallback_separator: "||".to_string(),
            exclude_dirs: default_exclude_dirs(),
            report_dir: ".".to_string(),
            pre_build_hooks: false,
        }
    }
}

fn default_exclude_dirs() -> Vec<String> {
    [
        "node_modules",
        "__pycache__",
        ".git",
        "target",
        "build",
        "dist",
        ".venv",
        "venv",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Determines which registry file to read, if any.
pub fn resolve_registry_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(raw) = explicit {
        return Some(expand_path(raw));
    }
    let local = PathBuf::from(DEFAULT_REGISTRY_PATH);
    if local.is_file() {
        return Some(local);
    }
    if let Some(proj_dirs) = ProjectDirs::from("com", "unibuild", "unibuild") {
        let user_path = proj_dirs.config_dir().join(USER_REGISTRY_FILENAME);
        if user_path.is_file() {
            return Some(user_path);
        }
        debug!("No user registry at {}", user_path.display());
    }
    None
}

/// Loads the language registry file.
///
/// Never fails: a missing or malformed file is logged at `error` level and an
/// empty registry (with default global settings) is returned instead.
pub fn load_registry_file(explicit: Option<&str>) -> RegistryFile {
    let Some(path) = resolve_registry_path(explicit) else {
        error!(
            "No language registry found (looked for --config, ./{}, and the user config directory). No projects will be detected.",
            DEFAULT_REGISTRY_PATH
        );
        return RegistryFile::default();
    };

    match read_registry_file(&path) {
        Ok(mut registry) => {
            validate_global(&mut registry.global);
            registry.global.report_dir = expand_path(&registry.global.report_dir)
                .to_string_lossy()
                .into_owned();
            info!(
                "Loaded language registry from {} ({} languages)",
                path.display(),
                registry.languages.len()
            );
            registry
        }
        Err(e) => {
            error!("{:#}. Continuing with an empty registry.", e);
            RegistryFile::default()
        }
    }
}

fn read_registry_file(path: &Path) -> Result<RegistryFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read language registry: {}", path.display()))?;
    parse_registry(&content)
        .with_context(|| format!("Failed to parse language registry: {}", path.display()))
}

/// Parses registry TOML content.
pub fn parse_registry(content: &str) -> Result<RegistryFile> {
    toml::from_str(content).map_err(|e| anyhow!(UnibuildError::Config(e.to_string())))
}

/// Repairs out-of-range global settings in place, warning about each one.
pub fn validate_global(global: &mut GlobalConfig) {
    let defaults = GlobalConfig::default();
    if global.max_parallel == 0 {
        warn!("global.max_parallel = 0 is not usable; using 1 worker.");
        global.max_parallel = 1;
    }
    for (name, value, default) in [
        (
            "marker_confidence",
            &mut global.marker_confidence,
            defaults.marker_confidence,
        ),
        (
            "pattern_confidence",
            &mut global.pattern_confidence,
            defaults.pattern_confidence,
        ),
        (
            "min_build_confidence",
            &mut global.min_build_confidence,
            defaults.min_build_confidence,
        ),
    ] {
        if !(0.0..=1.0).contains(value) {
            warn!(
                "global.{} = {} is outside [0, 1]; using {}.",
                name, value, default
            );
            *value = default;
        }
    }
    if global.fallback_separator.trim().is_empty() {
        warn!("global.fallback_separator is empty; using '||'.");
        global.fallback_separator = defaults.fallback_separator;
    }
    if global.command_timeout_secs == 0 {
        warn!(
            "global.command_timeout_secs = 0 is not usable; using {}.",
            defaults.command_timeout_secs
        );
        global.command_timeout_secs = defaults.command_timeout_secs;
    }
}

// --- Deployment configuration -------------------------------------------------

/// Contents of the deployment configuration file.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
    #[serde(default)]
    pub strategies: StrategiesConfig,
}

/// How an environment is operated.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    /// Driven through `kubectl`.
    Kubernetes,
    /// No orchestrator integration; phases succeed without external effects.
    #[default]
    Generic,
}

/// One `[environments.<id>]` table.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    #[serde(rename = "type", default)]
    pub kind: EnvironmentKind,
    /// Kubernetes namespace. Defaults to the environment id.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    /// Health endpoint template. `{environment}` and `{version}` are substituted.
    #[serde(default = "default_health_url")]
    pub health_url: String,
    /// Metrics endpoint template. `{environment}` is substituted.
    #[serde(default = "default_metrics_url")]
    pub metrics_url: String,
}

impl EnvironmentConfig {
    /// Creates a Kubernetes environment with default endpoints.
    pub fn kubernetes(namespace: &str, replicas: u32) -> Self {
        EnvironmentConfig {
            kind: EnvironmentKind::Kubernetes,
            namespace: Some(namespace.to_string()),
            replicas,
            health_url: default_health_url(),
            metrics_url: default_metrics_url(),
        }
    }

    /// The namespace to operate in, falling back to the environment id.
    pub fn namespace_or<'a>(&'a self, environment: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(environment)
    }
}

fn default_replicas() -> u32 {
    3
}
fn default_health_url() -> String {
    "http://{environment}-{version}.example.com/health".to_string()
}
fn default_metrics_url() -> String {
    "http://{environment}-canary.example.com/metrics".to_string()
}

/// Per-strategy tunables.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StrategiesConfig {
    #[serde(rename = "blue-green", default)]
    pub blue_green: BlueGreenConfig,
    #[serde(default)]
    pub canary: CanaryConfig,
    #[serde(default)]
    pub rolling: RollingConfig,
}

/// `[strategies.blue-green]`. Durations are in seconds.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BlueGreenConfig {
    /// Pause between health check attempts.
    pub health_check_interval: u64,
    /// Maximum number of health check attempts.
    pub health_check_attempts: u32,
    /// Highest error rate a healthy green deployment may report.
    pub rollback_threshold: f64,
    /// Pause between a passing health check and the traffic switch.
    pub switch_traffic_delay: u64,
    /// Upper bound for `kubectl rollout status` on the green deployment.
    pub rollout_timeout: u64,
}

impl Default for BlueGreenConfig {
    fn default() -> Self {
        BlueGreenConfig {
            health_check_interval: 30,
            health_check_attempts: 10,
            rollback_threshold: 0.05,
            switch_traffic_delay: 60,
            rollout_timeout: 300,
        }
    }
}

/// `[strategies.canary]`. Traffic values are percentages, durations seconds.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CanaryConfig {
    pub initial_traffic: i64,
    /// Must be positive, otherwise the migration loop never terminates.
    pub traffic_increment: i64,
    pub increment_interval: u64,
    /// Minimum success rate required to keep increasing traffic.
    pub success_threshold: f64,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        CanaryConfig {
            initial_traffic: 10,
            traffic_increment: 25,
            increment_interval: 300,
            success_threshold: 0.99,
        }
    }
}

/// `[strategies.rolling]`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RollingConfig {
    /// Upper bound for the rollout to complete, in seconds.
    pub rollout_timeout: u64,
}

impl Default for RollingConfig {
    fn default() -> Self {
        RollingConfig {
            rollout_timeout: 600,
        }
    }
}

/// The configuration used when no deployment file exists.
pub fn default_deploy_config() -> DeployConfig {
    let mut environments = BTreeMap::new();
    environments.insert(
        "staging".to_string(),
        EnvironmentConfig::kubernetes("staging", 2),
    );
    environments.insert(
        "production".to_string(),
        EnvironmentConfig::kubernetes("production", 5),
    );
    DeployConfig {
        environments,
        strategies: StrategiesConfig::default(),
    }
}

/// Loads and validates the deployment configuration.
///
/// A missing file yields `default_deploy_config()`. A malformed or invalid
/// file is an error.
pub fn load_deploy_config(explicit: Option<&str>) -> Result<DeployConfig> {
    let path = expand_path(explicit.unwrap_or(DEFAULT_DEPLOY_CONFIG_PATH));
    let config = if path.is_file() {
        info!("Loading deployment configuration from {}", path.display());
        let content = fs::read_to_string(&path).with_context(|| {
            format!("Failed to read deployment configuration: {}", path.display())
        })?;
        parse_deploy_config(&content).with_context(|| {
            format!(
                "Failed to parse deployment configuration: {}",
                path.display()
            )
        })?
    } else {
        warn!(
            "Deployment configuration {} not found, using built-in defaults.",
            path.display()
        );
        default_deploy_config()
    };
    validate_deploy_config(&config).context("Deployment configuration validation failed")?;
    debug!("Final deployment configuration: {:?}", config);
    Ok(config)
}

/// Parses deployment configuration TOML content (without validation).
pub fn parse_deploy_config(content: &str) -> Result<DeployConfig> {
    toml::from_str(content).map_err(|e| anyhow!(UnibuildError::Config(e.to_string())))
}

/// Rejects tunables the state machines cannot run with.
pub fn validate_deploy_config(config: &DeployConfig) -> Result<()> {
    let canary = &config.strategies.canary;
    if canary.traffic_increment <= 0 {
        return Err(anyhow!(UnibuildError::Config(format!(
            "strategies.canary.traffic_increment must be positive, got {}.",
            canary.traffic_increment
        ))));
    }
    if !(0..=100).contains(&canary.initial_traffic) {
        return Err(anyhow!(UnibuildError::Config(format!(
            "strategies.canary.initial_traffic must be within 0..=100, got {}.",
            canary.initial_traffic
        ))));
    }
    if !(0.0..=1.0).contains(&canary.success_threshold) {
        return Err(anyhow!(UnibuildError::Config(format!(
            "strategies.canary.success_threshold must be within [0, 1], got {}.",
            canary.success_threshold
        ))));
    }
    let blue_green = &config.strategies.blue_green;
    if !(0.0..=1.0).contains(&blue_green.rollback_threshold) {
        return Err(anyhow!(UnibuildError::Config(format!(
            "strategies.blue-green.rollback_threshold must be within [0, 1], got {}.",
            blue_green.rollback_threshold
        ))));
    }
    if blue_green.health_check_attempts == 0 {
        return Err(anyhow!(UnibuildError::Config(
            "strategies.blue-green.health_check_attempts must be at least 1.".to_string()
        )));
    }
    for (name, env) in &config.environments {
        if env.kind == EnvironmentKind::Kubernetes
            && env.namespace.as_deref().is_some_and(|ns| ns.trim().is_empty())
        {
            return Err(anyhow!(UnibuildError::Config(format!(
                "environments.{}.namespace must not be empty.",
                name
            ))));
        }
    }
    Ok(())
}

/// Looks up an environment, failing with the list of known ids.
pub fn environment<'a>(config: &'a DeployConfig, name: &str) -> Result<&'a EnvironmentConfig> {
    config.environments.get(name).ok_or_else(|| {
        anyhow!(UnibuildError::UnknownEnvironment {
            name: name.to_string(),
            known: config
                .environments
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        })
    })
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_registry() {
        let toml_content = r#"
            [global]
            parallel_builds = false
            max_parallel = 2

            [languages.rust]
            project_files = ["Cargo.toml"]
            file_patterns = ["*.rs"]

            [languages.rust.commands]
            build = "cargo build"
            test = "cargo test"
        "#;

        let registry = parse_registry(toml_content).expect("Failed to parse TOML");

        assert!(!registry.global.parallel_builds);
        assert_eq!(registry.global.max_parallel, 2);
        assert_eq!(registry.global.marker_confidence, 0.9); // Default
        assert_eq!(registry.global.command_timeout_secs, 300); // Default
        let rust = &registry.languages["rust"];
        assert_eq!(rust.project_files, vec!["Cargo.toml"]);
        assert_eq!(rust.commands["build"], "cargo build");
    }

    #[test]
    fn test_missing_registry_is_empty() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope.toml");
        let registry = load_registry_file(Some(missing.to_str().unwrap()));
        assert!(registry.languages.is_empty());
        assert_eq!(registry.global, GlobalConfig::default());
    }

    #[test]
    fn test_malformed_registry_is_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("languages.toml");
        fs::write(&path, "[languages.rust\nproject_files = ").unwrap();
        let registry = load_registry_file(Some(path.to_str().unwrap()));
        assert!(registry.languages.is_empty());
    }

    #[test]
    fn test_validate_global_repairs_values() {
        let mut global = GlobalConfig {
            max_parallel: 0,
            pattern_confidence: 1.5,
            fallback_separator: " ".to_string(),
            ..Default::default()
        };
        validate_global(&mut global);
        assert_eq!(global.max_parallel, 1);
        assert_eq!(global.pattern_confidence, 0.6);
        assert_eq!(global.fallback_separator, "||");
    }

    #[test]
    fn test_parse_deploy_config() {
        let content = r#"
            [environments.staging]
            type = "kubernetes"
            namespace = "stage"
            replicas = 2

            [environments.edge]
            type = "generic"

            [strategies.blue-green]
            switch_traffic_delay = 5

            [strategies.canary]
            initial_traffic = 5
            traffic_increment = 50
        "#;
        let config = parse_deploy_config(content).unwrap();
        assert!(validate_deploy_config(&config).is_ok());

        let staging = &config.environments["staging"];
        assert_eq!(staging.kind, EnvironmentKind::Kubernetes);
        assert_eq!(staging.namespace_or("staging"), "stage");
        assert_eq!(config.environments["edge"].kind, EnvironmentKind::Generic);
        assert_eq!(config.environments["edge"].namespace_or("edge"), "edge");
        assert_eq!(config.strategies.blue_green.switch_traffic_delay, 5);
        assert_eq!(config.strategies.blue_green.health_check_interval, 30); // Default
        assert_eq!(config.strategies.canary.traffic_increment, 50);
        assert_eq!(config.strategies.canary.success_threshold, 0.99); // Default
    }

    #[test]
    fn test_zero_canary_increment_is_rejected() {
        let config = parse_deploy_config("[strategies.canary]\ntraffic_increment = 0").unwrap();
        let result = validate_deploy_config(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("traffic_increment must be positive"));
    }

    #[test]
    fn test_negative_canary_increment_is_rejected() {
        let config = parse_deploy_config("[strategies.canary]\ntraffic_increment = -10").unwrap();
        assert!(validate_deploy_config(&config).is_err());
    }

    #[test]
    fn test_missing_deploy_config_uses_defaults() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("deploy.toml");
        let config = load_deploy_config(Some(missing.to_str().unwrap())).unwrap();
        assert_eq!(config, default_deploy_config());
        assert!(config.environments.contains_key("production"));
    }

    #[test]
    fn test_invalid_deploy_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("deploy.toml");
        fs::write(&path, "[strategies.canary]\ntraffic_increment = 0\n").unwrap();
        assert!(load_deploy_config(Some(path.to_str().unwrap())).is_err());
    }

    #[test]
    fn test_unknown_environment() {
        let config = default_deploy_config();
        let err = environment(&config, "qa").unwrap_err();
        assert!(err.to_string().contains("production, staging"));
        assert!(environment(&config, "staging").is_ok());
    }
}
