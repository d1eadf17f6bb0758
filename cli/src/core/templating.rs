//! # unibuild Manifest Templating
//!
//! File: cli/src/core/templating.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Renders the Kubernetes documents the deployment platform hands to `kubectl`:
//! the canary `Deployment` manifest and the service selector patch used to move
//! traffic between blue and green. Templates are compiled into the binary and
//! rendered with `tera`, so every value is substituted by name instead of being
//! spliced into YAML/JSON by hand.
//!
//! ## Usage
//!
//! ```rust
//! let manifest = templating::render_canary_manifest(&CanaryManifest {
//!     environment: "staging",
//!     namespace: "staging",
//!     image: "registry.local/app:1.4.2",
//!     replicas: 1,
//! })?;
//! ```
//!
use crate::core::error::{Result, UnibuildError};
use anyhow::anyhow;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::debug;

const CANARY_DEPLOYMENT_TEMPLATE: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{ environment }}-canary
  namespace: {{ namespace }}
spec:
  replicas: {{ replicas }}
  selector:
    matchLabels:
      app: {{ environment }}
      version: canary
  template:
    metadata:
      labels:
        app: {{ environment }}
        version: canary
    spec:
      containers:
      - name: app
        image: {{ image }}
"#;

const SERVICE_SELECTOR_PATCH_TEMPLATE: &str =
    r#"{"spec":{"selector":{"version":"{{ version }}"}}}"#;

/// Values substituted into the canary deployment manifest.
#[derive(Serialize, Debug)]
pub struct CanaryManifest<'a> {
    pub environment: &'a str,
    pub namespace: &'a str,
    pub image: &'a str,
    pub replicas: u32,
}

/// Renders the canary `Deployment` manifest.
pub fn render_canary_manifest(values: &CanaryManifest<'_>) -> Result<String> {
    render(CANARY_DEPLOYMENT_TEMPLATE, values, "canary deployment manifest")
}

/// Renders the JSON merge patch that points a service at `version` pods.
pub fn render_selector_patch(version: &str) -> Result<String> {
    #[derive(Serialize)]
    struct Selector<'a> {
        version: &'a str,
    }
    render(
        SERVICE_SELECTOR_PATCH_TEMPLATE,
        &Selector { version },
        "service selector patch",
    )
}

fn render<T: Serialize>(template: &str, values: &T, what: &str) -> Result<String> {
    let context = Context::from_serialize(values).map_err(|e| {
        anyhow!(UnibuildError::Template { source: e })
            .context(format!("Failed to build template context for {}", what))
    })?;
    // Autoescaping is for HTML; manifests must be rendered verbatim.
    let rendered = Tera::one_off(template, &context, false).map_err(|e| {
        anyhow!(UnibuildError::Template { source: e })
            .context(format!("Tera rendering failed for {}", what))
    })?;
    debug!("Rendered {}:\n{}", what, rendered);
    Ok(rendered)
}
