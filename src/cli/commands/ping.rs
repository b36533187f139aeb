//! Ping Command
//!
//! Connectivity check against the configured endpoint. Sends one short,
//! unretried request and prints the reply or the HTTP failure (masked).

use crate::ai::provider::GenerationClient;
use crate::cli::{CommandContext, Output};
use crate::types::{ErrorClassifier, GroundError, Result};

pub fn run(ctx: CommandContext) -> Result<()> {
    let output = Output::new();
    let client = GenerationClient::new(&ctx.config.llm)?;
    let report = client.describe();

    output.header("Endpoint");
    output.field("API style", &format!("{} (requested {})", report.style, report.requested_style));
    output.field("Base URL", &report.base_url);
    output.field("Target URL", &report.target_url);
    output.field("API version", &report.api_version);
    output.field("Model", &report.model);

    match CommandContext::runtime()?.block_on(client.ping()) {
        Ok(reply) => {
            output.success(&format!("Reply: {}", reply.trim()));
            Ok(())
        }
        Err(err) => {
            if let GroundError::Http(failure) = &err {
                output.error(&format!("HTTP {}: {}", failure.status, failure.body));
                if let Some(hint) = ErrorClassifier::diagnostic_hint(failure.status) {
                    output.warning(hint);
                }
            }
            Err(err)
        }
    }
}
