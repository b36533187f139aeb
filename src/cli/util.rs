//! CLI Common Utilities
//!
//! Shared configuration loading and runtime setup for command handlers.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::runtime::Runtime;

use crate::ai::provider::{SharedProvider, create_provider};
use crate::config::{Config, ConfigLoader};
use crate::types::{GroundError, Result};

/// Command execution context
pub struct CommandContext {
    /// Loaded, validated configuration
    pub config: Config,
    /// Explicit `--config` file, if any
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    /// Resolve configuration from every layer plus the explicit file
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = ConfigLoader::load(config_path)?;
        Ok(Self {
            config,
            config_path: config_path.map(Path::to_path_buf),
        })
    }

    /// Provider for the configured endpoint. Fails before any network
    /// activity when the API key is missing.
    pub fn provider(&self) -> Result<SharedProvider> {
        create_provider(&self.config.llm)
    }

    pub fn runtime() -> Result<Runtime> {
        Runtime::new().map_err(GroundError::Io)
    }
}

/// Read a whole text file given on the command line
pub fn read_input(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        GroundError::Config(format!("Cannot read {} file {}: {}", what, path.display(), e))
    })
}
