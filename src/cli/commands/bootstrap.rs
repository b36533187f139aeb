//! Bootstrap Command
//!
//! Generate the initial documentation tree for a local checkout.
//!
//! Usage:
//!   groundwiki bootstrap --repo-dir <dir> [--head <sha>] [--api-dir <rel>]

use std::path::PathBuf;

use tracing::info;

use crate::cli::{CommandContext, Output};
use crate::types::{GroundError, Result};
use crate::wiki::BootstrapPipeline;

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub repo_dir: PathBuf,
    pub head: Option<String>,
    pub api_dir: Option<String>,
}

pub fn run(ctx: CommandContext, options: BootstrapOptions) -> Result<()> {
    let output = Output::new();
    if !options.repo_dir.is_dir() {
        return Err(GroundError::Config(format!(
            "Repository directory not found: {}",
            options.repo_dir.display()
        )));
    }

    let provider = ctx.provider()?;
    info!(
        repo_dir = %options.repo_dir.display(),
        docs_root = %ctx.config.docs.root.display(),
        model = %ctx.config.llm.model,
        "Starting bootstrap"
    );
    output.header("Bootstrap");
    output.field("Repository", &options.repo_dir.display().to_string());
    output.field("Docs root", &ctx.config.docs.root.display().to_string());

    let pipeline = BootstrapPipeline::new(ctx.config, provider, &options.repo_dir)
        .with_head(options.head)
        .with_api_dir(options.api_dir);

    let summary = CommandContext::runtime()?.block_on(pipeline.run())?;
    output.run_summary(&summary);
    Ok(())
}
