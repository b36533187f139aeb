//! Generation Client
//!
//! Production `LlmProvider`: resolves the provider style once per base URL,
//! negotiates structured output, and runs every negotiation step through the
//! retry controller. Errors leaving the client have the API key masked.

use async_trait::async_trait;
use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::negotiation::NegotiationState;
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::transport::{HttpRequest, HttpTransport, Transport};
use super::{
    GenerationRequest, LlmProvider, ProviderStyle, build_schema_prompt, detect_style, gemini,
    openai,
};
use crate::ai::timeout::{TimeoutConfig, with_timeout};
use crate::config::{ApiStyle, LlmConfig};
use crate::types::{ErrorClassifier, GroundError, HttpFailure, Result, mask_secret};

const PING_PROMPT: &str = "Hello, this is a connectivity test. Please reply with 'OK'.";
const PING_MAX_TOKENS: u32 = 16;
const PING_TEMPERATURE: f32 = 0.1;

/// Endpoint details safe to show to the user
#[derive(Debug, Clone)]
pub struct PingReport {
    pub requested_style: ApiStyle,
    pub style: ProviderStyle,
    /// Masked base URL, or `(hidden)`
    pub base_url: String,
    /// Masked target URL, or `(hidden)`
    pub target_url: String,
    pub api_version: String,
    pub model: String,
}

pub struct GenerationClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
    timeouts: TimeoutConfig,
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    base_url: String,
    model: String,
    api_version: String,
    requested_style: ApiStyle,
    structured_output: bool,
    show_base_url: bool,
    styles: DashMap<String, ProviderStyle>,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.display_base_url())
            .field("model", &self.model)
            .field("requested_style", &self.requested_style)
            .field("structured_output", &self.structured_output)
            .field("retry", &self.retry)
            .finish()
    }
}

impl GenerationClient {
    /// Client with the reqwest transport and real sleeps.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let timeouts = TimeoutConfig::with_request_secs(config.timeout_secs);
        let transport = HttpTransport::new(timeouts.llm_request)?;
        Self::with_transport(config, Arc::new(transport), Arc::new(TokioSleeper))
    }

    /// Client over an arbitrary transport and sleeper.
    pub fn with_transport(
        config: &LlmConfig,
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        let api_key = config.require_api_key()?;
        Ok(Self {
            transport,
            sleeper,
            retry: RetryPolicy::default(),
            timeouts: TimeoutConfig::with_request_secs(config.timeout_secs),
            api_key: SecretString::from(api_key.to_string()),
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            requested_style: config.style,
            structured_output: config.structured_output,
            show_base_url: config.show_base_url_in_logs,
            styles: DashMap::new(),
        })
    }

    /// Style for this client's base URL, resolved once per run
    pub fn style(&self) -> ProviderStyle {
        *self
            .styles
            .entry(self.base_url.clone())
            .or_insert_with(|| detect_style(&self.base_url, self.requested_style))
    }

    /// Replace the API key in `text` with `***`
    pub fn mask(&self, text: &str) -> String {
        mask_secret(text, self.api_key.expose_secret())
    }

    fn display_base_url(&self) -> String {
        if self.show_base_url {
            self.mask(&self.base_url)
        } else {
            "(hidden)".to_string()
        }
    }

    fn target_url(&self, style: ProviderStyle) -> String {
        match style {
            ProviderStyle::OpenAi => openai::chat_url(&self.base_url),
            ProviderStyle::Gemini => {
                gemini::generate_url(&self.base_url, &self.api_version, &self.model)
            }
        }
    }

    fn build_http_request(
        &self,
        style: ProviderStyle,
        request: &GenerationRequest,
        state: NegotiationState,
    ) -> Result<HttpRequest> {
        let schema = request.schema.as_ref();
        let prompt = match schema {
            Some(s) if !state.sends_schema() => build_schema_prompt(&request.prompt, &s.schema),
            _ => request.prompt.clone(),
        };

        let url = self.target_url(style);
        match style {
            ProviderStyle::OpenAi => Ok(HttpRequest {
                url,
                auth_header: "Authorization",
                auth_value: SecretString::from(format!(
                    "Bearer {}",
                    self.api_key.expose_secret()
                )),
                body: openai::build_payload(
                    &self.model,
                    request,
                    &prompt,
                    state.response_format(schema),
                )?,
            }),
            ProviderStyle::Gemini => Ok(HttpRequest {
                url,
                auth_header: "x-goog-api-key",
                auth_value: SecretString::from(self.api_key.expose_secret().to_string()),
                body: gemini::build_payload(request, &prompt)?,
            }),
        }
    }

    async fn send_once(&self, style: ProviderStyle, request: &HttpRequest) -> Result<String> {
        let body = self.transport.post_json(request).await?;
        match style {
            ProviderStyle::OpenAi => openai::parse_response(&body),
            ProviderStyle::Gemini => gemini::parse_response(&body),
        }
    }

    /// Mask the key in error payloads that may echo the request
    fn scrub(&self, err: GroundError) -> GroundError {
        match err {
            GroundError::Http(failure) => {
                GroundError::Http(HttpFailure::new(failure.status, self.mask(&failure.body)))
            }
            GroundError::Transport(msg) => GroundError::Transport(self.mask(&msg)),
            other => other,
        }
    }

    /// Endpoint details for the connectivity check
    pub fn describe(&self) -> PingReport {
        let style = self.style();
        let target_url = if self.show_base_url {
            self.mask(&self.target_url(style))
        } else {
            "(hidden)".to_string()
        };
        PingReport {
            requested_style: self.requested_style,
            style,
            base_url: self.display_base_url(),
            target_url,
            api_version: self.api_version.clone(),
            model: self.model.clone(),
        }
    }

    /// Single unretried request with the short ping timeout.
    ///
    /// Returns the (masked) reply text.
    pub async fn ping(&self) -> Result<String> {
        let style = self.style();
        let request = GenerationRequest::new(PING_PROMPT)
            .with_temperature(PING_TEMPERATURE)
            .with_max_tokens(PING_MAX_TOKENS);
        let http = self.build_http_request(style, &request, NegotiationState::Unconstrained)?;

        with_timeout(self.timeouts.ping, self.send_once(style, &http), "ping")
            .await
            .map(|text| self.mask(&text))
            .map_err(|e| self.scrub(e))
    }
}

#[async_trait]
impl LlmProvider for GenerationClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let style = self.style();
        let schema = request.schema.as_ref();
        let mut state =
            NegotiationState::initial(style, self.structured_output, schema, &request.prompt);

        debug!(
            base_url = %self.display_base_url(),
            api_style = %style,
            temperature = request.temperature,
            max_tokens = request.max_tokens,
            ?state,
            "Sending LLM request"
        );

        loop {
            let http = self.build_http_request(style, request, state)?;
            let result = self
                .retry
                .run(
                    self.sleeper.as_ref(),
                    |_| self.send_once(style, &http),
                    |text| self.mask(text),
                )
                .await;

            match result {
                Ok(text) => return Ok(text),
                Err(err) => match state.on_error(&err, schema) {
                    Some(next) => {
                        info!(
                            from = ?state,
                            to = ?next,
                            status = err.status(),
                            "Endpoint rejected response_format, degrading"
                        );
                        state = next;
                    }
                    None => return Err(self.scrub(err)),
                },
            }
        }
    }

    fn name(&self) -> &str {
        match self.style() {
            ProviderStyle::OpenAi => "openai",
            ProviderStyle::Gemini => "gemini",
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Log a failed stage with its category, the HTTP diagnostic hint when
/// there is one, and a pointer to the connectivity check.
pub fn report_error(context: &str, err: &GroundError) {
    warn!(category = %err.category(), error = %err, "{} failed", context);
    if let GroundError::Http(failure) = err {
        if let Some(hint) = ErrorClassifier::diagnostic_hint(failure.status) {
            warn!(status = failure.status, "{}", hint);
        }
    }
    if err.is_fatal() {
        info!("To check connectivity, run `groundwiki ping`");
    }
}
