//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/groundwiki/config.toml)
//! 3. Project config (.groundwiki/config.toml)
//! 4. Explicit file (`--config`)
//! 5. Environment variables (GROUNDWIKI_*, then the flat deployment names)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
