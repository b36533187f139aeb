//! OpenAI-compatible Chat Completions wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GenerationRequest;
use crate::types::{GroundError, Result};

/// `{base}/v1/chat/completions`, reusing a trailing `/v1` already in the base
pub fn chat_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Request body. `prompt` is the final user text (schema instructions
/// already applied by the caller).
pub fn build_payload(
    model: &str,
    request: &GenerationRequest,
    prompt: &str,
    response_format: Option<Value>,
) -> Result<Value> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system.as_deref() {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: prompt,
    });

    let body = ChatCompletionRequest {
        model,
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        response_format,
    };
    Ok(serde_json::to_value(body)?)
}

/// `choices[0].message.content`, trimmed
pub fn parse_response(body: &Value) -> Result<String> {
    let response: ChatCompletionResponse = serde_json::from_value(body.clone())
        .map_err(|e| GroundError::Transport(format!("unexpected OpenAI response shape: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| GroundError::Transport("No content in OpenAI response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_url() {
        assert_eq!(
            chat_url("https://api.openai.com"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            chat_url("http://localhost:8000/proxy"),
            "http://localhost:8000/proxy/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_payload_with_system() {
        let req = GenerationRequest::new("hi")
            .with_system("be terse")
            .with_temperature(0.3)
            .with_max_tokens(100);
        let body = build_payload("gpt-x", &req, "hi", Some(json!({"type": "json_object"}))).unwrap();
        assert_eq!(body["model"], "gpt-x");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_build_payload_omits_response_format() {
        let req = GenerationRequest::new("hi");
        let body = build_payload("m", &req, "hi", None).unwrap();
        assert!(body.get("response_format").is_none());
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_response() {
        let body = json!({"choices": [{"message": {"content": "  ok \n"}}]});
        assert_eq!(parse_response(&body).unwrap(), "ok");

        let empty = json!({"choices": []});
        assert!(matches!(parse_response(&empty), Err(GroundError::Transport(_))));
    }
}
