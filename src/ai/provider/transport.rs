//! HTTP transport for generation endpoints.
//!
//! The transport knows nothing about provider styles: it POSTs a JSON body
//! with one auth header and returns the decoded JSON response. Non-2xx
//! statuses become `GroundError::Http`; connection and decode failures
//! become `GroundError::Transport`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::ai::timeout::with_timeout;
use crate::types::{GroundError, Result};

/// A fully built provider request
pub struct HttpRequest {
    pub url: String,
    pub auth_header: &'static str,
    pub auth_value: SecretString,
    pub body: Value,
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("auth_header", &self.auth_header)
            .field("auth_value", &"[REDACTED]")
            .field("body", &self.body)
            .finish()
    }
}

/// Sends a provider request and returns the JSON response body
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, request: &HttpRequest) -> Result<Value>;
}

/// reqwest-backed transport with a per-call timeout
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| GroundError::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(timeout_secs = self.timeout.as_secs()))]
    async fn post_json(&self, request: &HttpRequest) -> Result<Value> {
        let call = async {
            let response = self
                .client
                .post(&request.url)
                .header(request.auth_header, request.auth_value.expose_secret())
                .header("Content-Type", "application/json")
                .json(&request.body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;
            debug!(status = status.as_u16(), bytes = text.len(), "Provider responded");

            if !status.is_success() {
                return Err(GroundError::http(status.as_u16(), text));
            }

            serde_json::from_str::<Value>(&text).map_err(|e| {
                GroundError::Transport(format!("provider returned non-JSON body: {}", e))
            })
        };

        with_timeout(self.timeout, call, "LLM request").await
    }
}
