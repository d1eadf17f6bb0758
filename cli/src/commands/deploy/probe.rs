//! # unibuild Health and Metrics Probes
//!
//! File: cli/src/commands/deploy/probe.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! The deployment strategies consult two external signals:
//!
//! - `HealthProbe`: is a deployed version healthy? Used by blue-green before
//!   switching traffic.
//! - `MetricsProbe`: how is the canary doing at a given traffic percentage?
//!   Used by canary before each traffic increase.
//!
//! The HTTP implementations poll the endpoints configured per environment
//! (`health_url`, `metrics_url`). `{environment}` and `{version}` placeholders
//! are substituted before each request. The static implementations report a
//! perfectly healthy system and back dry runs and tests.
//!
use crate::common::network;
use crate::core::error::{Result, UnibuildError};
use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-request timeout for both probes.
pub const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of polling a health endpoint.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub healthy: bool,
    pub attempts: u32,
    /// Error rate reported by the service, if its health body carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Polls until the version reports healthy or attempts run out. `Err` is
    /// reserved for failures of the probe itself, not an unhealthy service.
    async fn check(&self, environment: &str, version: &str) -> Result<HealthReport>;
}

/// Canary metrics at one traffic percentage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CanaryMetrics {
    pub success_rate: f64,
    /// Milliseconds.
    #[serde(default)]
    pub response_time_p95: f64,
    #[serde(default)]
    pub request_count: u64,
}

impl CanaryMetrics {
    pub fn error_rate(&self) -> f64 {
        1.0 - self.success_rate
    }
}

#[async_trait]
pub trait MetricsProbe: Send + Sync {
    async fn sample(&self, environment: &str, traffic_percent: u8) -> Result<CanaryMetrics>;
}

fn fill_template(template: &str, environment: &str, version: &str) -> String {
    template
        .replace("{environment}", environment)
        .replace("{version}", version)
}

/// Polls `GET <health_url>` until it answers 200 with `{"status": "healthy"}`.
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url_template: String,
    attempts: u32,
    interval: Duration,
}

impl HttpHealthProbe {
    pub fn new(url_template: &str, attempts: u32, interval: Duration) -> Result<Self> {
        Ok(HttpHealthProbe {
            client: network::http_client(PROBE_REQUEST_TIMEOUT)?,
            url_template: url_template.to_string(),
            attempts: attempts.max(1),
            interval,
        })
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self, environment: &str, version: &str) -> Result<HealthReport> {
        let url = fill_template(&self.url_template, environment, version);
        for attempt in 1..=self.attempts {
            match network::get_json(&self.client, &url, &[]).await {
                Ok(response) => {
                    let healthy = response.status == 200
                        && response
                            .body
                            .as_ref()
                            .and_then(|b| b.get("status"))
                            .and_then(Value::as_str)
                            == Some("healthy");
                    if healthy {
                        let error_rate = response
                            .body
                            .as_ref()
                            .and_then(|b| b.get("error_rate"))
                            .and_then(Value::as_f64);
                        return Ok(HealthReport {
                            healthy: true,
                            attempts: attempt,
                            error_rate,
                            response: response.body,
                        });
                    }
                    debug!(
                        "Health check attempt {} for {}: HTTP {}",
                        attempt, url, response.status
                    );
                }
                Err(e) => warn!("Health check attempt {} failed: {}", attempt, e),
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        Ok(HealthReport {
            healthy: false,
            attempts: self.attempts,
            error_rate: None,
            response: None,
        })
    }
}

/// Reads canary metrics from `GET <metrics_url>?traffic=<percent>`.
pub struct HttpMetricsProbe {
    client: reqwest::Client,
    url_template: String,
}

impl HttpMetricsProbe {
    pub fn new(url_template: &str) -> Result<Self> {
        Ok(HttpMetricsProbe {
            client: network::http_client(PROBE_REQUEST_TIMEOUT)?,
            url_template: url_template.to_string(),
        })
    }
}

#[async_trait]
impl MetricsProbe for HttpMetricsProbe {
    async fn sample(&self, environment: &str, traffic_percent: u8) -> Result<CanaryMetrics> {
        let url = fill_template(&self.url_template, environment, "canary");
        let response = network::get_json(
            &self.client,
            &url,
            &[("traffic", traffic_percent.to_string())],
        )
        .await?;
        if !response.is_success() {
            return Err(anyhow!(UnibuildError::ProbeResponse(format!(
                "{} answered HTTP {}",
                url, response.status
            ))));
        }
        let body = response.body.ok_or_else(|| {
            anyhow!(UnibuildError::ProbeResponse(format!(
                "{} did not return JSON",
                url
            )))
        })?;
        serde_json::from_value(body).map_err(|e| {
            anyhow!(UnibuildError::ProbeResponse(format!(
                "unexpected metrics body from {}: {}",
                url, e
            )))
        })
    }
}

/// Always healthy. Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticHealthProbe;

#[async_trait]
impl HealthProbe for StaticHealthProbe {
    async fn check(&self, _environment: &str, _version: &str) -> Result<HealthReport> {
        Ok(HealthReport {
            healthy: true,
            attempts: 1,
            error_rate: Some(0.0),
            response: None,
        })
    }
}

/// Reports fixed metrics. Used for dry runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticMetricsProbe(pub CanaryMetrics);

impl Default for StaticMetricsProbe {
    fn default() -> Self {
        StaticMetricsProbe(CanaryMetrics {
            success_rate: 1.0,
            response_time_p95: 0.0,
            request_count: 0,
        })
    }
}

#[async_trait]
impl MetricsProbe for StaticMetricsProbe {
    async fn sample(&self, _environment: &str, _traffic_percent: u8) -> Result<CanaryMetrics> {
        Ok(self.0.clone())
    }
}
