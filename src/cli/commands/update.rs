//! Update Command
//!
//! Apply at most one documentation change for a commit.
//!
//! Usage:
//!   groundwiki update (--message <text> | --message-file <f>) --diff-file <f> [--force]

use std::path::PathBuf;

use crate::cli::{CommandContext, Output, read_input};
use crate::types::{GroundError, Result};
use crate::wiki::UpdatePipeline;

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub message: Option<String>,
    pub message_file: Option<PathBuf>,
    pub diff_file: PathBuf,
    pub force: bool,
}

impl UpdateOptions {
    /// Commit message from the flag or the file
    fn commit_message(&self) -> Result<String> {
        match (&self.message, &self.message_file) {
            (Some(message), _) => Ok(message.clone()),
            (None, Some(path)) => read_input(path, "message"),
            (None, None) => Err(GroundError::Config(
                "A commit message is required (--message or --message-file)".to_string(),
            )),
        }
    }
}

pub fn run(ctx: CommandContext, options: UpdateOptions) -> Result<()> {
    let output = Output::new();
    let message = options.commit_message()?;
    let diff = read_input(&options.diff_file, "diff")?;
    if diff.trim().is_empty() {
        output.info("Empty diff, nothing to do");
        return Ok(());
    }

    let provider = ctx.provider()?;
    output.header("Update");
    output.field("Docs root", &ctx.config.docs.root.display().to_string());
    output.field("Diff", &format!("{} line(s)", diff.lines().count()));

    let pipeline = UpdatePipeline::new(ctx.config, provider);
    let summary =
        CommandContext::runtime()?.block_on(pipeline.run(&message, &diff, options.force))?;
    output.run_summary(&summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(message: Option<&str>, file: Option<PathBuf>) -> UpdateOptions {
        UpdateOptions {
            message: message.map(String::from),
            message_file: file,
            diff_file: PathBuf::from("x.diff"),
            force: false,
        }
    }

    #[test]
    fn test_commit_message_sources() {
        assert_eq!(options(Some("feat"), None).commit_message().unwrap(), "feat");
        assert!(matches!(
            options(None, None).commit_message(),
            Err(GroundError::Config(_))
        ));
    }
}
