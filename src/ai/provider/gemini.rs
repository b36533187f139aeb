//! Gemini `generateContent` wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GenerationRequest;
use crate::constants::network::DEFAULT_GEMINI_API_VERSION;
use crate::types::{GroundError, Result};

/// `{base}/{version}/models/{model}:generateContent`; a base that already
/// ends in `/v1` or `/v1beta` keeps its own version.
pub fn generate_url(base_url: &str, api_version: &str, model: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let versioned = base.ends_with("/v1") || base.ends_with("/v1beta");
    let root = if versioned {
        base.to_string()
    } else {
        let version = api_version.trim().trim_matches('/');
        let version = if version.is_empty() {
            DEFAULT_GEMINI_API_VERSION
        } else {
            version
        };
        format!("{}/{}", base, version)
    };
    format!("{}/models/{}:generateContent", root, model.trim())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

pub fn build_payload(request: &GenerationRequest, prompt: &str) -> Result<Value> {
    let body = GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![Part { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        },
        system_instruction: request.system.as_deref().map(|text| SystemInstruction {
            parts: vec![Part { text }],
        }),
    };
    Ok(serde_json::to_value(body)?)
}

/// Concatenated text parts of the first candidate, trimmed
pub fn parse_response(body: &Value) -> Result<String> {
    let response: GenerateContentResponse = serde_json::from_value(body.clone())
        .map_err(|e| GroundError::Transport(format!("unexpected Gemini response shape: {}", e)))?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GroundError::Transport("No candidates in Gemini response".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    Ok(text.trim().to_string())
}
