//! Tolerant Value Extraction
//!
//! Recovers one JSON object or array from model output.
//!
//! Handles common model output issues:
//! - Markdown code fence wrapping (```json ... ```)
//! - Smart quotes
//! - Raw newlines inside string literals
//! - Trailing commas
//! - JSON embedded in explanatory text

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Deserializer, Value};
use tracing::debug;

use crate::constants::extraction::{MAX_SCAN_CANDIDATES, TRAILING_COMMA_PASSES};
use crate::types::{GroundError, Result};

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("JSON fence regex should compile")
});

// =============================================================================
// Convenience Functions
// =============================================================================

/// Extract a JSON object or array from model output.
///
/// This is the primary entry point for parsing model output.
pub fn extract_value(text: &str) -> Result<Value> {
    ValueExtractor::new().extract(text)
}

// =============================================================================
// ValueExtractor
// =============================================================================

/// Recovery strategy that produced the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Strict,
    FirstValue,
    Scan,
}

pub struct ValueExtractor {
    max_candidates: usize,
}

impl Default for ValueExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueExtractor {
    pub fn new() -> Self {
        Self {
            max_candidates: MAX_SCAN_CANDIDATES,
        }
    }

    /// Extract a value. A ```json fence, when present, is the only text tried.
    pub fn extract(&self, text: &str) -> Result<Value> {
        self.extract_with_strategy(text).map(|(value, _)| value)
    }

    /// Extract a value, also reporting which strategy succeeded
    pub fn extract_with_strategy(&self, text: &str) -> Result<(Value, Strategy)> {
        let body = match JSON_FENCE.captures(text).and_then(|c| c.get(1)) {
            Some(inner) => {
                debug!("Found json code fence");
                inner.as_str()
            }
            None => text,
        };
        self.parse_tolerant(body)
    }

    fn parse_tolerant(&self, raw: &str) -> Result<(Value, Strategy)> {
        let s = sanitize_json_like(raw);
        if s.is_empty() {
            return Err(GroundError::parse("Empty model output after sanitize", ""));
        }

        if let Ok(value) = serde_json::from_str::<Value>(&s)
            && is_structured(&value)
        {
            return Ok((value, Strategy::Strict));
        }

        if let Some(value) = decode_first(&s) {
            debug!("Decoded leading JSON value, ignoring trailing text");
            return Ok((value, Strategy::FirstValue));
        }

        for (idx, (pos, _)) in s
            .match_indices(['{', '['])
            .take(self.max_candidates)
            .enumerate()
        {
            if let Some(value) = decode_first(&s[pos..]) {
                debug!(candidate = idx, offset = pos, "Recovered JSON value by scanning");
                return Ok((value, Strategy::Scan));
            }
        }

        Err(GroundError::parse(
            "Failed to parse JSON from model output",
            &s,
        ))
    }
}

fn is_structured(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Decode the first JSON value, tolerating trailing text.
fn decode_first(s: &str) -> Option<Value> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    Deserializer::from_str(s)
        .into_iter::<Value>()
        .next()?
        .ok()
        .filter(is_structured)
}

// =============================================================================
// Sanitizer
// =============================================================================

/// Best-effort cleanup of JSON-like model output.
///
/// In order: trim and strip BOM, normalize smart quotes, escape raw CR/LF
/// inside string literals, remove trailing commas before `}`/`]` outside
/// string literals (repeated to a fixed point, bounded).
pub fn sanitize_json_like(s: &str) -> String {
    let s = s.trim().trim_start_matches('\u{feff}').trim();
    if s.is_empty() {
        return String::new();
    }

    let s = s
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let mut s = escape_newlines_in_strings(&s);

    for _ in 0..TRAILING_COMMA_PASSES {
        let next = strip_trailing_commas(&s);
        if next == s {
            break;
        }
        s = next;
    }

    s
}

/// Escape raw newlines inside double-quoted strings.
fn escape_newlines_in_strings(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if in_string {
            if escape {
                escape = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escape = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }

    out
}

/// One pass of trailing comma removal, outside string literals
fn strip_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];

        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            i += 1;
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }

        out.push(ch);
        i += 1;
    }

    out
}
