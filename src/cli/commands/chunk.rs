//! Chunk Command
//!
//! Dry run of directory chunking: prints every chunk header and size
//! without contacting the endpoint.
//!
//! Usage:
//!   groundwiki chunk --repo-dir <dir> [--dir <rel>]

use std::path::Path;

use console::style;

use crate::ai::chunker::{ChunkBudget, ContextChunker, DiskSource};
use crate::analyzer::{FileScanner, group_by_dir};
use crate::cli::{CommandContext, Output};
use crate::types::{GroundError, Result};

pub fn run(ctx: CommandContext, repo_dir: &Path, dir: Option<&str>) -> Result<()> {
    let output = Output::new();
    let paths = FileScanner::new(repo_dir)
        .with_exclude(&ctx.config.repo.exclude)?
        .paths()?;
    let groups = group_by_dir(&paths);
    let selected = dir.map(|d| d.trim().trim_matches('/'));

    if let Some(wanted) = selected
        && !groups.contains_key(wanted)
    {
        return Err(GroundError::Config(format!(
            "No scanned files under directory: {}",
            wanted
        )));
    }

    let chunker = ContextChunker::new(DiskSource::new(repo_dir));
    let max_context_chars = ctx.config.chunking.max_context_chars;
    output.header("Chunking (dry run)");
    output.field("Files", &paths.len().to_string());
    output.field("Context", &format!("{} chars", max_context_chars));

    let mut total_chunks = 0;
    for (group, files) in &groups {
        if selected.is_some_and(|wanted| wanted != group.as_str()) {
            continue;
        }
        // No RepoMap exists yet; its share of the context is not reserved here.
        let budget = ChunkBudget::for_directory(max_context_chars, 0, group);
        let chunks = chunker.chunk_dir(group, files, budget);
        total_chunks += chunks.len();

        output.section(&format!("{} ({} files, budget {})", group, files.len(), budget.budget));
        for chunk in &chunks {
            print!("{}", chunk.header());
            println!(
                "{}\n",
                style(format!("body: {} chars", chunk.body_chars())).dim()
            );
        }
    }

    output.success(&format!("{} chunk(s)", total_chunks));
    Ok(())
}
