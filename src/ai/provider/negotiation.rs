//! Structured Output Negotiation
//!
//! Decides which `response_format` (if any) accompanies an OpenAI-style
//! request, and how to degrade when the endpoint rejects it:
//!
//! ```text
//! SchemaRequested --reject--> JsonObjectFallback           (object root)
//! SchemaRequested --reject--> UnconstrainedAfterRejection  (array root)
//! JsonObjectFallback --reject--> UnconstrainedAfterRejection
//! ```
//!
//! Gemini-style endpoints always start (and stay) `Unconstrained`; any schema
//! is embedded in the prompt instead.

use serde_json::{Value, json};

use super::{ProviderStyle, SchemaDescriptor};
use crate::constants::negotiation::{REJECTION_MARKERS, REJECTION_STATUSES};
use crate::types::GroundError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No response format was ever requested
    Unconstrained,
    /// Strict `json_schema` response format
    SchemaRequested,
    /// Best-effort `json_object` mode
    JsonObjectFallback,
    /// Response format dropped after the endpoint rejected it
    UnconstrainedAfterRejection,
}

impl NegotiationState {
    pub fn initial(
        style: ProviderStyle,
        structured_output: bool,
        schema: Option<&SchemaDescriptor>,
        prompt: &str,
    ) -> Self {
        if !structured_output || style == ProviderStyle::Gemini {
            return Self::Unconstrained;
        }
        match schema {
            Some(_) => Self::SchemaRequested,
            None if prompt.to_lowercase().contains("json") => Self::JsonObjectFallback,
            None => Self::Unconstrained,
        }
    }

    /// `response_format` value for this state
    pub fn response_format(&self, schema: Option<&SchemaDescriptor>) -> Option<Value> {
        match self {
            Self::SchemaRequested => schema.map(|s| {
                json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": s.sanitized_name(),
                        "strict": true,
                        "schema": s.schema,
                    }
                })
            }),
            Self::JsonObjectFallback => Some(json!({ "type": "json_object" })),
            Self::Unconstrained | Self::UnconstrainedAfterRejection => None,
        }
    }

    /// Whether the schema travels as `response_format` rather than in the prompt
    pub fn sends_schema(&self) -> bool {
        matches!(self, Self::SchemaRequested)
    }

    /// Next state after `err`, or `None` when the error must propagate.
    pub fn on_error(&self, err: &GroundError, schema: Option<&SchemaDescriptor>) -> Option<Self> {
        if !is_format_rejection(err) {
            return None;
        }
        match self {
            Self::SchemaRequested => {
                if schema.is_some_and(SchemaDescriptor::root_is_array) {
                    Some(Self::UnconstrainedAfterRejection)
                } else {
                    Some(Self::JsonObjectFallback)
                }
            }
            Self::JsonObjectFallback => Some(Self::UnconstrainedAfterRejection),
            Self::Unconstrained | Self::UnconstrainedAfterRejection => None,
        }
    }
}

/// A 400/422 whose body names the response-format parameter (or a generic
/// "unsupported"/"invalid" complaint)
pub fn is_format_rejection(err: &GroundError) -> bool {
    match err {
        GroundError::Http(failure) if REJECTION_STATUSES.contains(&failure.status) => {
            let body = failure.body.to_lowercase();
            REJECTION_MARKERS.iter().any(|marker| body.contains(marker))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_schema() -> SchemaDescriptor {
        SchemaDescriptor::new("record", json!({"type": "object"}))
    }

    fn array_schema() -> SchemaDescriptor {
        SchemaDescriptor::new("items", json!({"type": "array"}))
    }

    #[test]
    fn test_initial_state() {
        let schema = object_schema();
        assert_eq!(
            NegotiationState::initial(ProviderStyle::OpenAi, true, Some(&schema), "x"),
            NegotiationState::SchemaRequested
        );
        assert_eq!(
            NegotiationState::initial(ProviderStyle::OpenAi, true, None, "Return JSON only"),
            NegotiationState::JsonObjectFallback
        );
        assert_eq!(
            NegotiationState::initial(ProviderStyle::OpenAi, true, None, "say hi"),
            NegotiationState::Unconstrained
        );
        assert_eq!(
            NegotiationState::initial(ProviderStyle::Gemini, true, Some(&schema), "json"),
            NegotiationState::Unconstrained
        );
        assert_eq!(
            NegotiationState::initial(ProviderStyle::OpenAi, false, Some(&schema), "json"),
            NegotiationState::Unconstrained
        );
    }

    #[test]
    fn test_response_format_shapes() {
        let schema = SchemaDescriptor::new("doc plan", json!({"type": "object"}));
        let rf = NegotiationState::SchemaRequested
            .response_format(Some(&schema))
            .unwrap();
        assert_eq!(rf["type"], "json_schema");
        assert_eq!(rf["json_schema"]["name"], "doc_plan");
        assert_eq!(rf["json_schema"]["strict"], true);

        assert_eq!(
            NegotiationState::JsonObjectFallback.response_format(None),
            Some(json!({"type": "json_object"}))
        );
        assert!(
            NegotiationState::UnconstrainedAfterRejection
                .response_format(Some(&schema))
                .is_none()
        );
    }

    #[test]
    fn test_object_schema_degrades_to_json_object() {
        let schema = object_schema();
        let err = GroundError::http(400, "Unknown parameter: response_format");
        let next = NegotiationState::SchemaRequested.on_error(&err, Some(&schema));
        assert_eq!(next, Some(NegotiationState::JsonObjectFallback));

        let next = NegotiationState::JsonObjectFallback.on_error(&err, Some(&schema));
        assert_eq!(next, Some(NegotiationState::UnconstrainedAfterRejection));

        assert_eq!(
            NegotiationState::UnconstrainedAfterRejection.on_error(&err, Some(&schema)),
            None
        );
    }

    #[test]
    fn test_array_schema_skips_json_object() {
        let schema = array_schema();
        let err = GroundError::http(422, "json_schema is not supported by this model");
        assert_eq!(
            NegotiationState::SchemaRequested.on_error(&err, Some(&schema)),
            Some(NegotiationState::UnconstrainedAfterRejection)
        );
    }

    #[test]
    fn test_other_errors_propagate() {
        let schema = object_schema();
        for err in [
            GroundError::http(500, "response_format"),
            GroundError::http(400, "context length exceeded"),
            GroundError::http(401, "invalid key"),
            GroundError::Transport("reset".into()),
        ] {
            assert_eq!(
                NegotiationState::SchemaRequested.on_error(&err, Some(&schema)),
                None,
                "{err}"
            );
        }
    }
}
