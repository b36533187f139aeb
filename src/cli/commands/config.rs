//! Config Command
//!
//! Manage GroundWiki configuration.
//!
//! Usage:
//!   groundwiki config show [--format toml|json]
//!   groundwiki config path
//!   groundwiki config init [--global] [--force]

use crate::cli::{CommandContext, Output};
use crate::config::ConfigLoader;
use crate::types::{GroundError, Result};

/// Show the merged effective configuration
pub fn show(ctx: &CommandContext, format: &str) -> Result<()> {
    let as_json = match format {
        "json" => true,
        "toml" => false,
        other => {
            return Err(GroundError::Config(format!(
                "Unknown format '{}'. Valid values: toml, json",
                other
            )));
        }
    };
    if let Some(path) = &ctx.config_path {
        println!("# Explicit config: {}\n", path.display());
    }
    ConfigLoader::show_config(&ctx.config, as_json)
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let config_path = ConfigLoader::init_global(force)?;
    Output::new().success("Initialized global configuration");
    println!("  Config:    {}", config_path.display());
    Ok(())
}

/// Initialize project configuration in the current directory
pub fn init_project() -> Result<()> {
    let root = std::env::current_dir()?;
    let repo = root.file_name().and_then(|n| n.to_str());

    let config_path = ConfigLoader::init_project(&root, repo)?;
    Output::new().success("Initialized project configuration");
    println!("  Config:    {}", config_path.display());
    Ok(())
}
