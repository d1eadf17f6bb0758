//! # unibuild Network Utilities (`common::network`)
//!
//! File: cli/src/common/network/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! A thin layer over `reqwest` for the deployment probes. Probes only ever issue
//! GET requests and expect a JSON body, so this module offers exactly that: a
//! client with a request timeout and a `get_json` helper that returns the HTTP
//! status together with the decoded body (if the body was JSON at all).
//!
//! ## Usage
//!
//! ```rust
//! let client = network::http_client(Duration::from_secs(10))?;
//! let response = network::get_json(&client, "http://staging-green.example.com/health", &[]).await?;
//! if response.status == 200 { /* inspect response.body */ }
//! ```
//!
use crate::core::error::UnibuildError;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Status and decoded body of a GET request.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    pub status: u16,
    /// `None` when the body was empty or not valid JSON.
    pub body: Option<Value>,
}

impl JsonResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Builds an HTTP client whose requests fail after `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, UnibuildError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Issues a GET request with the given query parameters.
///
/// Transport failures (connection refused, timeout) are errors. Any HTTP
/// status, including 5xx, is returned as a `JsonResponse`.
pub async fn get_json(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<JsonResponse, UnibuildError> {
    let response = client.get(url).query(query).send().await?;
    let status = response.status().as_u16();
    let text = response.text().await?;
    let body = serde_json::from_str(&text).ok();
    debug!("GET {} -> {} ({} bytes)", url, status, text.len());
    Ok(JsonResponse { status, body })
}
