//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Components receive the sub-struct they need at construction; nothing
//! reads the environment after loading.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{chunking, context, network, pipeline, sampling};
use crate::types::{GroundError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Upstream repository identity
    pub repo: RepoConfig,

    /// LLM endpoint settings
    pub llm: LlmConfig,

    /// Output length caps per stage
    pub tokens: TokenCaps,

    /// Context chunking settings
    pub chunking: ChunkingConfig,

    /// Documentation output settings
    pub docs: DocsConfig,

    /// Evidence grounding settings
    pub evidence: EvidenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            repo: RepoConfig::default(),
            llm: LlmConfig::default(),
            tokens: TokenCaps::default(),
            chunking: ChunkingConfig::default(),
            docs: DocsConfig::default(),
            evidence: EvidenceConfig::default(),
        }
    }
}

impl Config {
    /// Clamp values that have a safe range instead of a hard limit.
    pub fn normalize(&mut self) {
        self.llm.temperature = self
            .llm
            .temperature
            .clamp(sampling::MIN_TEMPERATURE, sampling::MAX_TEMPERATURE);
        self.chunking.max_context_chars = self
            .chunking
            .max_context_chars
            .max(chunking::MIN_MAX_CONTEXT_CHARS);
        self.docs.max_pages = self.docs.max_pages.max(1);
        self.llm.base_url = self.llm.base_url.trim().trim_end_matches('/').to_string();
    }

    /// Validate configuration values are within acceptable ranges.
    /// Returns `GroundError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(sampling::MIN_TEMPERATURE..=sampling::MAX_TEMPERATURE).contains(&self.llm.temperature)
        {
            return Err(GroundError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(GroundError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.model.trim().is_empty() {
            return Err(GroundError::Config("LLM model must not be empty".to_string()));
        }

        if url::Url::parse(&self.llm.base_url).is_err() {
            return Err(GroundError::Config(format!(
                "LLM base_url is not a valid URL: {}",
                self.llm.base_url
            )));
        }

        if self.docs.root.as_os_str().is_empty() {
            return Err(GroundError::Config("docs.root must not be empty".to_string()));
        }

        Ok(())
    }
}

// =============================================================================
// Repository Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Repository identifier (e.g. `org/project`); defaults to the checkout's directory name
    pub name: String,

    /// Branch the docs describe
    pub branch: String,

    /// Extra glob patterns excluded from repository scans
    pub exclude: Vec<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            branch: "main".to_string(),
            exclude: Vec::new(),
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// Request convention of the endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiStyle {
    /// Infer from the base URL host
    #[default]
    Auto,
    OpenAi,
    Gemini,
}

impl std::fmt::Display for ApiStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiStyle::Auto => write!(f, "auto"),
            ApiStyle::OpenAi => write!(f, "openai"),
            ApiStyle::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for ApiStyle {
    type Err = GroundError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(ApiStyle::Auto),
            "openai" => Ok(ApiStyle::OpenAi),
            "gemini" => Ok(ApiStyle::Gemini),
            other => Err(GroundError::Config(format!(
                "LLM api_style must be one of: auto/openai/gemini (got '{}')",
                other
            ))),
        }
    }
}

/// LLM endpoint configuration
///
/// The API key is never serialized and is redacted in debug output; the
/// client converts it to a `SecretString` before use.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Endpoint base URL
    pub base_url: String,

    /// API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model name
    pub model: String,

    /// Request convention
    #[serde(rename = "api_style")]
    pub style: ApiStyle,

    /// Version segment for Gemini-style URLs
    pub api_version: String,

    /// Sampling temperature used by pipeline stages
    pub temperature: f32,

    /// Request structured output from providers that support it
    pub structured_output: bool,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Print the (masked) base URL in logs
    pub show_base_url_in_logs: bool,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("style", &self.style)
            .field("api_version", &self.api_version)
            .field("temperature", &self.temperature)
            .field("structured_output", &self.structured_output)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: network::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: network::DEFAULT_MODEL.to_string(),
            style: ApiStyle::Auto,
            api_version: network::DEFAULT_GEMINI_API_VERSION.to_string(),
            temperature: sampling::STAGE_TEMPERATURE,
            structured_output: true,
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            show_base_url_in_logs: false,
        }
    }
}

impl LlmConfig {
    /// Non-blank API key or a config error
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                GroundError::Config(
                    "API key not found. Set GEMINI_API_KEY (or OPENAI_API_KEY) or llm.api_key"
                        .to_string(),
                )
            })
    }
}

// =============================================================================
// Token Caps
// =============================================================================

/// Generation call sites with their own output cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RepoMap,
    DirAnalysis,
    DocPlan,
    DocPage,
    ApiPage,
    BootstrapDocs,
    DiffSummary,
    Update,
    Relevance,
}

/// Output caps. `global` overrides every stage-specific value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenCaps {
    pub global: Option<u32>,
    pub repo_map: Option<u32>,
    pub dir_analysis: Option<u32>,
    pub doc_plan: Option<u32>,
    pub doc_page: Option<u32>,
    pub api_page: Option<u32>,
    pub bootstrap_docs: Option<u32>,
    pub diff_summary: Option<u32>,
    pub update: Option<u32>,
}

impl TokenCaps {
    /// Resolve the cap for a stage: global → stage-specific → built-in default, minimum 1.
    pub fn resolve(&self, stage: Stage) -> u32 {
        let (specific, default) = match stage {
            Stage::RepoMap => (self.repo_map, sampling::DEFAULT_STAGE_MAX_TOKENS),
            Stage::DirAnalysis => (self.dir_analysis, sampling::DEFAULT_STAGE_MAX_TOKENS),
            Stage::DocPlan => (self.doc_plan, sampling::DEFAULT_STAGE_MAX_TOKENS),
            Stage::DocPage => (self.doc_page, sampling::DEFAULT_STAGE_MAX_TOKENS),
            Stage::ApiPage => (self.api_page, sampling::DEFAULT_STAGE_MAX_TOKENS),
            Stage::BootstrapDocs => (self.bootstrap_docs, sampling::DEFAULT_STAGE_MAX_TOKENS),
            Stage::DiffSummary => (self.diff_summary, sampling::DEFAULT_STAGE_MAX_TOKENS),
            Stage::Update => (self.update, sampling::DEFAULT_CALL_MAX_TOKENS),
            Stage::Relevance => {
                let v = self.global.filter(|v| *v > 0).unwrap_or(pipeline::RELEVANCE_DEFAULT_TOKENS);
                return v.clamp(1, pipeline::RELEVANCE_MAX_TOKENS);
            }
        };

        self.global
            .filter(|v| *v > 0)
            .or(specific.filter(|v| *v > 0))
            .unwrap_or(default)
            .max(1)
    }
}

// =============================================================================
// Chunking Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Model context size in characters (floor 8000)
    pub max_context_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_context_chars: chunking::DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

// =============================================================================
// Docs Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Documentation root; categories are relative to it
    pub root: PathBuf,

    /// Category used when an applied change names an unsafe one
    pub default_category: String,

    /// Category for per-module API pages
    pub api_category: String,

    /// Recommended categories offered to the model; empty lets it choose
    pub categories: Vec<String>,

    /// Cap on planned pages
    pub max_pages: usize,

    /// Existing-doc context limits for update prompts
    pub context_max_files: usize,
    pub context_max_chars_per_file: usize,
    pub context_max_total_chars: usize,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("docs"),
            default_category: "modules".to_string(),
            api_category: "api".to_string(),
            categories: Vec::new(),
            max_pages: pipeline::DEFAULT_MAX_PAGES,
            context_max_files: context::DOC_CONTEXT_MAX_FILES,
            context_max_chars_per_file: context::DOC_CONTEXT_MAX_CHARS_PER_FILE,
            context_max_total_chars: context::DOC_CONTEXT_MAX_TOTAL_CHARS,
        }
    }
}

// =============================================================================
// Evidence Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Substitute structurally guaranteed tokens when cited evidence is
    /// not found. Disabling it rejects every record whose own citations
    /// fall short.
    pub allow_fallback: bool,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            allow_fallback: true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.timeout_secs, 600);
        assert!(config.llm.structured_output);
        assert!(config.evidence.allow_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_normalize_clamps() {
        let mut config = Config::default();
        config.llm.temperature = 3.5;
        config.chunking.max_context_chars = 100;
        config.docs.max_pages = 0;
        config.llm.base_url = "https://api.example.com/".to_string();
        config.normalize();
        assert_eq!(config.llm.temperature, 2.0);
        assert_eq!(config.chunking.max_context_chars, 8000);
        assert_eq!(config.docs.max_pages, 1);
        assert_eq!(config.llm.base_url, "https://api.example.com");
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.llm.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(GroundError::Config(_))));
    }

    #[test]
    fn test_api_style_parse() {
        assert_eq!("OpenAI".parse::<ApiStyle>().unwrap(), ApiStyle::OpenAi);
        assert_eq!("".parse::<ApiStyle>().unwrap(), ApiStyle::Auto);
        assert!("anthropic".parse::<ApiStyle>().is_err());
    }

    #[test]
    fn test_token_caps_precedence() {
        let mut caps = TokenCaps::default();
        assert_eq!(caps.resolve(Stage::RepoMap), 8192);
        assert_eq!(caps.resolve(Stage::Update), 2048);

        caps.repo_map = Some(1000);
        assert_eq!(caps.resolve(Stage::RepoMap), 1000);

        caps.global = Some(300);
        assert_eq!(caps.resolve(Stage::RepoMap), 300);
        assert_eq!(caps.resolve(Stage::Update), 300);

        caps.global = Some(0);
        assert_eq!(caps.resolve(Stage::RepoMap), 1000);
    }

    #[test]
    fn test_relevance_cap_bounded() {
        let mut caps = TokenCaps::default();
        assert_eq!(caps.resolve(Stage::Relevance), pipeline::RELEVANCE_DEFAULT_TOKENS);
        caps.global = Some(4096);
        assert_eq!(caps.resolve(Stage::Relevance), pipeline::RELEVANCE_MAX_TOKENS);
    }

    #[test]
    fn test_api_key_redacted_in_debug() {
        let llm = LlmConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", llm);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_require_api_key() {
        let mut llm = LlmConfig::default();
        assert!(llm.require_api_key().is_err());
        llm.api_key = Some("  ".to_string());
        assert!(llm.require_api_key().is_err());
        llm.api_key = Some("k".to_string());
        assert_eq!(llm.require_api_key().unwrap(), "k");
    }
}
