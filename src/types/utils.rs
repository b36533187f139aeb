//! Shared utility functions for value extraction and text handling.
//!
//! ## JSON Extraction Helpers
//!
//! Provides ergonomic helpers for extracting values from `serde_json::Value`:
//! - `json_string`, `json_string_or` - Extract strings
//! - `json_string_list` - Extract string lists (a lone string is wrapped)
//! - `json_usize` - Extract counters
//! - `json_objects` - Deserialize list items, skipping malformed ones

use serde::de::DeserializeOwned;
use serde_json::Value;

// =============================================================================
// JSON Value Extraction Helpers
// =============================================================================

/// Extract string from JSON value by key.
#[inline]
pub fn json_string(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(String::from)
}

/// Extract a trimmed string, falling back to `default` when absent or blank.
#[inline]
pub fn json_string_or(value: &Value, key: &str, default: &str) -> String {
    json_string(value, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Extract a list of strings by key.
///
/// Models sometimes answer a list field with a single string; a non-blank
/// string is wrapped into a one-element list. Non-string items are skipped.
pub fn json_string_list(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|s| s.as_str().map(String::from))
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Extract a non-negative integer, accepting integral floats and numeric strings.
pub fn json_usize(value: &Value, key: &str) -> Option<usize> {
    match value.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Deserialize each element of a list field, dropping the ones that don't fit.
pub fn json_objects<T: DeserializeOwned>(value: &Value, key: &str) -> Vec<T> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter(|item| item.is_object())
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// String Utilities
// =============================================================================

/// Keep at most `max` characters (char-boundary safe).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Replace every occurrence of `secret` with `***`.
pub fn mask_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "***")
}

/// Today's local date as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_json_string_list_wraps_lone_string() {
        let v = json!({"risks": "one risk", "deps": ["a", 1, "b"], "empty": "  "});
        assert_eq!(json_string_list(&v, "risks"), vec!["one risk"]);
        assert_eq!(json_string_list(&v, "deps"), vec!["a", "b"]);
        assert!(json_string_list(&v, "empty").is_empty());
        assert!(json_string_list(&v, "missing").is_empty());
    }

    #[test]
    fn test_json_usize_accepts_float_and_string() {
        let v = json!({"a": 3, "b": 2.0, "c": "7", "d": -1});
        assert_eq!(json_usize(&v, "a"), Some(3));
        assert_eq!(json_usize(&v, "b"), Some(2));
        assert_eq!(json_usize(&v, "c"), Some(7));
        assert_eq!(json_usize(&v, "d"), None);
    }

    #[test]
    fn test_json_objects_skips_malformed() {
        #[derive(Deserialize)]
        struct Item {
            name: String,
        }
        let v = json!({"items": [{"name": "x"}, "junk", {"name": 5}, {"name": "y"}]});
        let items: Vec<Item> = json_objects(&v, "items");
        let names: Vec<_> = items.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("key=sk-123 again sk-123", "sk-123"), "key=*** again ***");
        assert_eq!(mask_secret("nothing", ""), "nothing");
    }
}
