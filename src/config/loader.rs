//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/groundwiki/config.toml)
//! 3. Project config (.groundwiki/config.toml)
//! 4. Explicit `--config` file
//! 5. Environment variables (GROUNDWIKI_* prefix, `__` between sections)
//! 6. Flat variables of the deployment environment (GEMINI_API_KEY, MODEL_NAME, ...)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::{ApiStyle, Config};
use crate::types::{GroundError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → explicit file → prefixed env → flat env
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(GroundError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        // e.g. GROUNDWIKI_LLM__MODEL -> llm.model
        figment = figment.merge(Env::prefixed("GROUNDWIKI_").split("__").lowercase(true));

        let mut config: Config = figment
            .extract()
            .map_err(|e| GroundError::Config(format!("Configuration error: {}", e)))?;

        Self::apply_legacy_env(&mut config, |key| env::var(key).ok())?;
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| GroundError::Config(format!("Configuration error: {}", e)))?;
        config.normalize();
        Ok(config)
    }

    /// Overlay the flat variable names used by deployment environments.
    ///
    /// Blank values are ignored. Numeric values that fail to parse are ignored
    /// too, except `LLM_API_STYLE`, where an unknown value is a config error.
    pub fn apply_legacy_env<F>(config: &mut Config, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|k| get(*k));

        if let Some(key) = first(&["GEMINI_API_KEY", "OPENAI_API_KEY"]) {
            config.llm.api_key = Some(key);
        }
        if let Some(url) = first(&["BASE_URL", "OPENAI_API_BASE"]) {
            config.llm.base_url = url;
        }
        if let Some(version) = get("GEMINI_API_VERSION") {
            config.llm.api_version = version;
        }
        if let Some(model) = get("MODEL_NAME") {
            config.llm.model = model;
        }
        if let Some(style) = get("LLM_API_STYLE") {
            config.llm.style = style.parse::<ApiStyle>()?;
        }
        if let Some(flag) = get("SHOW_BASE_URL_IN_LOGS") {
            config.llm.show_base_url_in_logs = parse_flag(&flag);
        }
        if let Some(flag) = get("LLM_STRUCTURED_OUTPUT") {
            config.llm.structured_output = parse_flag(&flag);
        }
        if let Some(temp) = get("LLM_TEMPERATURE").and_then(|v| v.parse::<f32>().ok()) {
            config.llm.temperature = temp;
        }

        let cap = |keys: &[&str]| first(keys).and_then(|v| v.parse::<u32>().ok());
        let tokens = &mut config.tokens;
        if let Some(v) = cap(&["LLM_MAX_OUTPUT_TOKENS", "LLM_MAX_TOKENS"]) {
            tokens.global = Some(v);
        }
        for (key, slot) in [
            ("LLM_REPO_MAP_MAX_TOKENS", &mut tokens.repo_map),
            ("LLM_DIR_ANALYSIS_MAX_TOKENS", &mut tokens.dir_analysis),
            ("LLM_DOC_PLAN_MAX_TOKENS", &mut tokens.doc_plan),
            ("LLM_DOC_PAGE_MAX_TOKENS", &mut tokens.doc_page),
            ("LLM_API_PAGE_MAX_TOKENS", &mut tokens.api_page),
            ("LLM_BOOTSTRAP_DOCS_MAX_TOKENS", &mut tokens.bootstrap_docs),
            ("LLM_DIFF_SUMMARY_MAX_TOKENS", &mut tokens.diff_summary),
            ("LLM_UPDATE_MAX_TOKENS", &mut tokens.update),
        ] {
            if let Some(v) = cap(&[key]) {
                *slot = Some(v);
            }
        }

        let size = |keys: &[&str]| first(keys).and_then(|v| v.parse::<usize>().ok());
        if let Some(v) = size(&["LLM_MAX_CONTEXT_CHARS", "BOOTSTRAP_MAX_CONTEXT_CHARS"]) {
            config.chunking.max_context_chars = v;
        }
        if let Some(v) = size(&["BOOTSTRAP_MAX_PAGES"]) {
            config.docs.max_pages = v;
        }
        if let Some(v) = size(&["DOC_CONTEXT_MAX_FILES"]) {
            config.docs.context_max_files = v;
        }
        if let Some(v) = size(&["DOC_CONTEXT_MAX_CHARS_PER_FILE"]) {
            config.docs.context_max_chars_per_file = v;
        }
        if let Some(v) = size(&["DOC_CONTEXT_MAX_TOTAL_CHARS"]) {
            config.docs.context_max_total_chars = v;
        }

        if let Some(root) = get("DOCS_ROOT") {
            config.docs.root = PathBuf::from(root);
        }
        if let Some(repo) = get("UPSTREAM_REPO") {
            config.repo.name = repo;
        }
        if let Some(branch) = get("UPSTREAM_BRANCH") {
            config.repo.branch = branch;
        }
        if let Some(flag) = get("EVIDENCE_ALLOW_FALLBACK") {
            config.evidence.allow_fallback = parse_flag(&flag);
        }

        Ok(())
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/groundwiki/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .or_else(|| directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()))
            .map(|p| p.join("groundwiki"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".groundwiki")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Show current effective configuration. The API key is never printed.
    pub fn show_config(config: &Config, as_json: bool) -> Result<()> {
        if as_json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| GroundError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            GroundError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Initialize project configuration under `root`
    pub fn init_project(root: &Path, repo: Option<&str>) -> Result<PathBuf> {
        let project_dir = root.join(Self::project_dir());
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config(repo))?;
            info!("Created project config: {}", config_path.display());
        } else {
            info!("Project config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> String {
        r#"# GroundWiki Global Configuration
# User-wide defaults. Project settings in .groundwiki/config.toml override these.

version = "1.0"

[llm]
base_url = "https://generativelanguage.googleapis.com"
model = "gemini-1.5-flash"
api_style = "auto"
timeout_secs = 600
structured_output = true
# api_key is best provided through GEMINI_API_KEY or OPENAI_API_KEY
"#
        .to_string()
    }

    fn default_project_config(repo: Option<&str>) -> String {
        format!(
            r#"# GroundWiki Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[repo]
name = "{}"
branch = "main"

[docs]
root = "docs"
max_pages = 60

[chunking]
max_context_chars = 120000

[evidence]
allow_fallback = true
"#,
            repo.unwrap_or("")
        )
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_legacy_env_overlay() {
        let mut config = Config::default();
        ConfigLoader::apply_legacy_env(
            &mut config,
            lookup(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_API_BASE", "https://llm.internal/v1"),
                ("MODEL_NAME", "gpt-4o-mini"),
                ("LLM_API_STYLE", "openai"),
                ("LLM_MAX_TOKENS", "512"),
                ("LLM_DOC_PAGE_MAX_TOKENS", "4000"),
                ("BOOTSTRAP_MAX_PAGES", "7"),
                ("EVIDENCE_ALLOW_FALLBACK", "false"),
                ("UPSTREAM_BRANCH", "develop"),
            ]),
        )
        .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.base_url, "https://llm.internal/v1");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.style, ApiStyle::OpenAi);
        assert_eq!(config.tokens.global, Some(512));
        assert_eq!(config.tokens.doc_page, Some(4000));
        assert_eq!(config.docs.max_pages, 7);
        assert!(!config.evidence.allow_fallback);
        assert_eq!(config.repo.branch, "develop");
    }

    #[test]
    fn test_legacy_env_prefers_gemini_key() {
        let mut config = Config::default();
        ConfigLoader::apply_legacy_env(
            &mut config,
            lookup(&[("GEMINI_API_KEY", "g-key"), ("OPENAI_API_KEY", "o-key")]),
        )
        .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_legacy_env_ignores_blank_and_garbage() {
        let mut config = Config::default();
        ConfigLoader::apply_legacy_env(
            &mut config,
            lookup(&[
                ("MODEL_NAME", "   "),
                ("LLM_TEMPERATURE", "warm"),
                ("LLM_MAX_CONTEXT_CHARS", "lots"),
            ]),
        )
        .unwrap();
        assert_eq!(config.llm.model, "gemini-1.5-flash");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.chunking.max_context_chars, 120_000);
    }

    #[test]
    fn test_legacy_env_rejects_unknown_style() {
        let mut config = Config::default();
        let result =
            ConfigLoader::apply_legacy_env(&mut config, lookup(&[("LLM_API_STYLE", "cohere")]));
        assert!(matches!(result, Err(GroundError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[llm]\nmodel = \"custom\"\ntemperature = 5.0\n[chunking]\nmax_context_chars = 10\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.llm.model, "custom");
        assert_eq!(config.llm.temperature, 2.0);
        assert_eq!(config.chunking.max_context_chars, 8000);
        assert_eq!(config.docs.max_pages, 60);
    }

    #[test]
    fn test_load_from_file_rejects_bad_style() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[llm]\napi_style = \"anthropic\"\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(GroundError::Config(_))
        ));
    }

    #[test]
    fn test_init_project() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigLoader::init_project(temp_dir.path(), Some("org/repo")).unwrap();
        assert!(path.exists());
        assert!(temp_dir.path().join(".groundwiki").is_dir());

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.repo.name, "org/repo");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }
}
