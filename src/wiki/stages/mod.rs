//! Generation Stages
//!
//! Each stage turns one prompt into one validated record (or a list of
//! them). Stages share a `StageRunner`, which carries the provider, the
//! output caps and the run identity.
//!
//! ## Error policy
//! - Parse and validation failures stay local: the stage logs them and
//!   drops the record
//! - HTTP, transport, timeout and config failures propagate and end the run

pub mod briefs;
pub mod dir_analysis;
pub mod doc_page;
pub mod doc_plan;
pub mod repo_map;
pub mod update;

pub use briefs::build_dir_briefs;
pub use dir_analysis::{analyze_chunk, analyze_directory};
pub use doc_page::{generate_api_page, generate_bootstrap_docs, generate_doc_page};
pub use doc_plan::generate_doc_plan;
pub use repo_map::generate_repo_map;
pub use update::{generate_change_record, preprocess_diff, should_update_docs};

use serde_json::{Map, Value};

use crate::ai::provider::{GenerationRequest, SharedProvider, report_error};
use crate::ai::validation::ValidationPipeline;
use crate::config::{Config, Stage, TokenCaps};
use crate::types::{GroundError, Result, today};

/// Shared state for stage calls within one run
pub struct StageRunner {
    provider: SharedProvider,
    tokens: TokenCaps,
    temperature: f32,
    validator: ValidationPipeline,
    /// Substitute guaranteed tokens when cited evidence falls short
    pub allow_fallback: bool,
    pub repo: String,
    pub branch: String,
    /// `YYYY-MM-DD` stamped into generated frontmatter
    pub today: String,
}

impl StageRunner {
    pub fn new(provider: SharedProvider, config: &Config, repo: &str, branch: &str) -> Self {
        Self {
            provider,
            tokens: config.tokens.clone(),
            temperature: config.llm.temperature,
            validator: ValidationPipeline::new(),
            allow_fallback: config.evidence.allow_fallback,
            repo: repo.to_string(),
            branch: branch.to_string(),
            today: today(),
        }
    }

    /// Fix the date stamp (tests and reproducible runs)
    pub fn with_today(mut self, today: &str) -> Self {
        self.today = today.to_string();
        self
    }

    /// Request with the stage's output cap and the configured temperature
    pub fn request(&self, stage: Stage, prompt: String, system: &str) -> GenerationRequest {
        GenerationRequest::new(prompt)
            .with_system(system)
            .with_temperature(self.temperature)
            .with_max_tokens(self.tokens.resolve(stage))
    }

    pub async fn send(&self, request: &GenerationRequest) -> Result<String> {
        self.provider.generate(request).await
    }

    pub fn validator(&self) -> &ValidationPipeline {
        &self.validator
    }

    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    /// Default map for the coercer
    pub(crate) fn defaults(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Keep fatal errors, log and swallow document-local ones.
///
/// Returns `Ok(None)` when the record was dropped.
pub(crate) fn isolate<T>(context: &str, result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_fatal() => {
            report_error(context, &err);
            Err(err)
        }
        Err(err) => {
            report_error(context, &err);
            Ok(None)
        }
    }
}

/// Pretty JSON for embedding records in prompts
pub(crate) fn to_prompt_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(GroundError::from)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider shared by stage and pipeline tests.

    use super::*;
    use crate::ai::provider::LlmProvider;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex, MutexGuard};

    type Responder = Box<dyn Fn(&GenerationRequest) -> Result<String> + Send + Sync>;

    /// Answers each request with a closure and records it
    pub struct ScriptedProvider {
        responder: Responder,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedProvider {
        pub fn new<F>(responder: F) -> Arc<Self>
        where
            F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
        {
            Arc::new(Self {
                responder: Box::new(responder),
                requests: Mutex::new(Vec::new()),
            })
        }

        /// Always answer with the same text
        pub fn fixed(text: &str) -> Arc<Self> {
            let text = text.to_string();
            Self::new(move |_| Ok(text.clone()))
        }

        pub fn requests(&self) -> MutexGuard<'_, Vec<GenerationRequest>> {
            self.requests.lock().unwrap()
        }
    }

    /// Schema name of a request, or `""`
    pub fn schema_name(request: &GenerationRequest) -> &str {
        request.schema.as_ref().map(|s| s.name.as_str()).unwrap_or("")
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            (self.responder)(request)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }
    }

    pub fn runner(provider: Arc<ScriptedProvider>) -> StageRunner {
        runner_with(provider, &Config::default())
    }

    pub fn runner_with(provider: Arc<ScriptedProvider>, config: &Config) -> StageRunner {
        StageRunner::new(provider, config, "org/repo", "main").with_today("2025-01-01")
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_isolate_keeps_fatal_errors() {
        let local: Result<()> = Err(GroundError::parse("no json", "text"));
        assert!(matches!(isolate("stage", local), Ok(None)));

        let fatal: Result<()> = Err(GroundError::http(401, "bad key"));
        assert!(isolate("stage", fatal).is_err());

        assert_eq!(isolate("stage", Ok(3)).unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_request_uses_stage_caps() {
        let mut config = Config::default();
        config.tokens.doc_plan = Some(1234);
        let provider = ScriptedProvider::fixed("ok");
        let runner = runner_with(provider.clone(), &config);

        let request = runner.request(Stage::DocPlan, "p".into(), "sys");
        assert_eq!(request.max_tokens, 1234);
        assert_eq!(request.system.as_deref(), Some("sys"));

        assert_eq!(runner.send(&request).await.unwrap(), "ok");
        assert_eq!(provider.requests().len(), 1);
    }
}
