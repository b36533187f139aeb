//! LLM Provider Abstraction
//!
//! Defines the `LlmProvider` trait used by every pipeline stage, plus the
//! request types shared by the OpenAI-style and Gemini-style wire formats.
//!
//! ## Modules
//!
//! - `transport`: HTTP POST with per-call timeout and status classification
//! - `retry`: bounded linear-backoff retry with an injectable sleeper
//! - `negotiation`: structured-output state machine
//! - `client`: `GenerationClient`, the production `LlmProvider`

mod client;
mod gemini;
mod negotiation;
mod openai;
mod prompt_utils;
mod retry;
mod transport;

pub use client::{GenerationClient, PingReport, report_error};
pub use negotiation::{NegotiationState, is_format_rejection};
pub use prompt_utils::build_schema_prompt;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use transport::{HttpRequest, HttpTransport, Transport};

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, HttpFailure};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{ApiStyle, LlmConfig};
use crate::constants::{negotiation as neg_constants, sampling};
use crate::types::Result;

// =============================================================================
// Provider Style
// =============================================================================

/// Wire convention of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderStyle {
    OpenAi,
    Gemini,
}

impl std::fmt::Display for ProviderStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderStyle::OpenAi => write!(f, "openai"),
            ProviderStyle::Gemini => write!(f, "gemini"),
        }
    }
}

/// Resolve the concrete style for `base_url`.
///
/// An explicit style wins; `auto` picks Gemini for Google API hosts and
/// OpenAI-compatible for everything else.
pub fn detect_style(base_url: &str, requested: ApiStyle) -> ProviderStyle {
    match requested {
        ApiStyle::OpenAi => ProviderStyle::OpenAi,
        ApiStyle::Gemini => ProviderStyle::Gemini,
        ApiStyle::Auto => {
            let host = url::Url::parse(base_url.trim())
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
                .unwrap_or_default();
            if host.contains("generativelanguage.googleapis.com")
                || host.ends_with(".googleapis.com")
            {
                ProviderStyle::Gemini
            } else {
                ProviderStyle::OpenAi
            }
        }
    }
}

// =============================================================================
// Generation Request
// =============================================================================

/// Named JSON schema for structured output
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    pub name: String,
    pub schema: Value,
}

impl SchemaDescriptor {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Name usable as `json_schema.name`: runs of disallowed characters
    /// collapse to `_`, at most 64 characters, never empty.
    pub fn sanitized_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut in_run = false;
        for ch in self.name.trim().chars() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                out.push(ch);
                in_run = false;
            } else if !in_run {
                out.push('_');
                in_run = true;
            }
        }
        let truncated: String = out.chars().take(neg_constants::MAX_SCHEMA_NAME_LEN).collect();
        if truncated.is_empty() {
            neg_constants::DEFAULT_SCHEMA_NAME.to_string()
        } else {
            truncated
        }
    }

    /// Whether the schema's root type is `array`
    pub fn root_is_array(&self) -> bool {
        self.schema.get("type").and_then(Value::as_str) == Some("array")
    }
}

/// One generation call. Built once, never mutated by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub schema: Option<SchemaDescriptor>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: sampling::DEFAULT_TEMPERATURE,
            max_tokens: sampling::DEFAULT_CALL_MAX_TOKENS,
            schema: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.system = (!system.trim().is_empty()).then_some(system);
        self
    }

    /// Temperature, clamped to the provider range
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = if temperature.is_finite() {
            temperature.clamp(sampling::MIN_TEMPERATURE, sampling::MAX_TEMPERATURE)
        } else {
            sampling::DEFAULT_TEMPERATURE
        };
        self
    }

    /// Output cap, at least 1
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    pub fn with_schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schema = Some(schema);
        self
    }
}

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// Text generation endpoint used by the pipeline stages
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text for a request
    ///
    /// Retries and structured-output negotiation happen inside; the caller
    /// sees either the final text or the error that ended the call.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;
}

/// Shared LLM provider type for access across pipeline stages.
pub type SharedProvider = Arc<dyn LlmProvider>;

/// Create the production provider from configuration.
///
/// Fails with a config error when no API key is set, before any network
/// activity.
pub fn create_provider(config: &LlmConfig) -> Result<SharedProvider> {
    Ok(Arc::new(GenerationClient::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_style_auto() {
        assert_eq!(
            detect_style("https://generativelanguage.googleapis.com", ApiStyle::Auto),
            ProviderStyle::Gemini
        );
        assert_eq!(
            detect_style("https://us-central1-aiplatform.googleapis.com/v1", ApiStyle::Auto),
            ProviderStyle::Gemini
        );
        assert_eq!(
            detect_style("https://api.openai.com/v1", ApiStyle::Auto),
            ProviderStyle::OpenAi
        );
        assert_eq!(detect_style("not a url", ApiStyle::Auto), ProviderStyle::OpenAi);
    }

    #[test]
    fn test_detect_style_explicit_wins() {
        assert_eq!(
            detect_style("https://generativelanguage.googleapis.com", ApiStyle::OpenAi),
            ProviderStyle::OpenAi
        );
        assert_eq!(
            detect_style("http://localhost:8080", ApiStyle::Gemini),
            ProviderStyle::Gemini
        );
    }

    #[test]
    fn test_schema_name_sanitized() {
        let s = SchemaDescriptor::new("repo map / v2!!", json!({}));
        assert_eq!(s.sanitized_name(), "repo_map_v2_");
        let s = SchemaDescriptor::new("   ", json!({}));
        assert_eq!(s.sanitized_name(), "output");
        let s = SchemaDescriptor::new("x".repeat(100), json!({}));
        assert_eq!(s.sanitized_name().len(), 64);
    }

    #[test]
    fn test_schema_root_type() {
        assert!(SchemaDescriptor::new("a", json!({"type": "array"})).root_is_array());
        assert!(!SchemaDescriptor::new("o", json!({"type": "object"})).root_is_array());
    }

    #[test]
    fn test_request_clamps() {
        let req = GenerationRequest::new("p")
            .with_temperature(5.0)
            .with_max_tokens(0)
            .with_system("  ");
        assert_eq!(req.temperature, 2.0);
        assert_eq!(req.max_tokens, 1);
        assert!(req.system.is_none());

        let req = GenerationRequest::new("p").with_temperature(-1.0);
        assert_eq!(req.temperature, 0.0);
    }
}
