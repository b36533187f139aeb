//! Prompt building utilities for LLM providers.

use serde_json::Value;

/// Append JSON schema instructions to a prompt.
///
/// Used whenever the schema is not enforced through `response_format`
/// (Gemini-style endpoints, disabled structured output, or after the
/// endpoint rejected the format).
pub fn build_schema_prompt(user_prompt: &str, schema: &Value) -> String {
    if schema.is_null() {
        return user_prompt.to_string();
    }

    let schema_str = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "{}\n\n---\n\nRespond with valid JSON matching this schema:\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
        user_prompt, schema_str
    )
}
