//! Evidence Grounding
//!
//! A record is accepted only when enough of its cited evidence strings
//! occur verbatim in the haystack the model was given. The haystack is
//! always source context (files, diff, commit message), never prior model
//! output.

use serde_json::Value;
use tracing::debug;

use crate::constants::evidence::{
    RECORD_MIN_MATCHES, REPO_MAP_MIN_ITEMS, REPO_MAP_MIN_MATCHES,
};
use crate::types::{GroundError, Result, ValidationErrorKind};

/// Minimum grounding a record must reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvidencePolicy {
    /// Minimum number of cited items before verification
    pub min_items: usize,
    /// Minimum number of cited items found in the haystack
    pub min_matches: usize,
    /// Substitute structurally guaranteed tokens on shortfall
    pub allow_fallback: bool,
    /// Keep every cited item once enough are verified
    pub keep_cited: bool,
    /// Keep at most this many verified items
    pub max_kept: Option<usize>,
}

impl EvidencePolicy {
    /// Change records, plan items, pages: 2 items, 2 verified
    pub fn record(allow_fallback: bool) -> Self {
        Self {
            min_items: RECORD_MIN_MATCHES,
            min_matches: RECORD_MIN_MATCHES,
            allow_fallback,
            keep_cited: false,
            max_kept: None,
        }
    }

    /// Record policy that never falls back
    pub fn strict_record() -> Self {
        Self::record(false)
    }

    /// Repository map: 5 cited, 3 verified, no fallback; all cited items kept
    pub fn repo_map() -> Self {
        Self {
            min_items: REPO_MAP_MIN_ITEMS,
            min_matches: REPO_MAP_MIN_MATCHES,
            allow_fallback: false,
            keep_cited: true,
            max_kept: None,
        }
    }

    pub fn with_max_kept(mut self, max: usize) -> Self {
        self.max_kept = Some(max);
        self
    }

    /// Validate cited evidence against `haystack`.
    ///
    /// `min_items` counts the non-empty cited items before deduplication.
    /// Returns the verified, normalized items, or every normalized cited item
    /// when `keep_cited` is set. On shortfall, when fallback is allowed, the
    /// `fallback` candidates present in the haystack are used instead (first
    /// `min_matches` of them, in order).
    pub fn validate(
        &self,
        items: &[String],
        haystack: &str,
        fallback: &[String],
    ) -> Result<Vec<String>> {
        let cited = items.iter().filter(|ev| !normalize_item(ev).is_empty()).count();
        let normalized = normalize_evidence(items);
        let matched: Vec<String> = normalized
            .iter()
            .filter(|ev| haystack.contains(ev.as_str()))
            .cloned()
            .collect();

        if cited >= self.min_items && matched.len() >= self.min_matches {
            let kept = if self.keep_cited { normalized } else { matched };
            return Ok(self.cap(kept));
        }

        debug!(
            cited,
            verified = matched.len(),
            required = self.min_matches,
            "Evidence shortfall"
        );

        if self.allow_fallback {
            let mut substitutes: Vec<String> = Vec::new();
            for candidate in fallback {
                let token = candidate.trim();
                if !token.is_empty()
                    && haystack.contains(token)
                    && !substitutes.iter().any(|s| s == token)
                {
                    substitutes.push(token.to_string());
                }
            }
            if substitutes.len() >= self.min_matches {
                substitutes.truncate(self.min_matches);
                debug!(?substitutes, "Using fallback evidence");
                return Ok(substitutes);
            }
        }

        Err(GroundError::validation(
            ValidationErrorKind::Evidence,
            format!(
                "evidence must include >= {} items found verbatim in the provided context \
                 (cited {}, verified {})",
                self.min_matches,
                cited,
                matched.len()
            ),
        ))
    }

    /// Validate the `evidence` field of a JSON value (string or list)
    pub fn validate_value(
        &self,
        value: &Value,
        haystack: &str,
        fallback: &[String],
    ) -> Result<Vec<String>> {
        self.validate(&evidence_items(value), haystack, fallback)
    }

    fn cap(&self, mut items: Vec<String>) -> Vec<String> {
        if let Some(max) = self.max_kept {
            items.truncate(max);
        }
        items
    }
}

/// Trim whitespace then backticks, drop empties, sort, dedupe.
pub fn normalize_evidence(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = items
        .iter()
        .map(|ev| normalize_item(ev).to_string())
        .filter(|ev| !ev.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

fn normalize_item(ev: &str) -> &str {
    ev.trim().trim_matches('`')
}

/// String items of an evidence value; a lone string counts as one item
pub fn evidence_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_two_matches_pass() {
        let haystack = "src/core.py defines class Engine";
        let out = EvidencePolicy::strict_record()
            .validate(&strings(&["src/core.py", " `class Engine` "]), haystack, &[])
            .unwrap();
        assert_eq!(out, vec!["class Engine", "src/core.py"]);
    }

    #[test]
    fn test_one_match_fails_without_fallback() {
        let haystack = "src/core.py changed";
        let result = EvidencePolicy::strict_record().validate(
            &strings(&["src/core.py", "nonexistent.py"]),
            haystack,
            &strings(&["src/core.py"]),
        );
        assert!(matches!(result, Err(GroundError::Validation(_))));
    }

    #[test]
    fn test_fallback_substitutes_guaranteed_tokens() {
        let haystack = "Directory: src\n- src/core.py\n- src/util.py";
        let out = EvidencePolicy::record(true)
            .validate(
                &strings(&["made up", "src/core.py"]),
                haystack,
                &strings(&["src/missing.py", "src/core.py", "src/util.py", "Directory: src"]),
            )
            .unwrap();
        assert_eq!(out, vec!["src/core.py", "src/util.py"]);
    }

    #[test]
    fn test_fallback_needs_enough_tokens() {
        let haystack = "src/core.py changed";
        let result = EvidencePolicy::record(true).validate(
            &strings(&["src/core.py", "nonexistent.py"]),
            haystack,
            &strings(&["src/core.py", "src/core.py", "other"]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_fallback_disabled_rejects() {
        let haystack = "a b c";
        let result =
            EvidencePolicy::record(false).validate(&strings(&["zzz"]), haystack, &strings(&["a", "b"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_repo_map_needs_five_items() {
        let haystack = "alpha beta gamma delta";
        let policy = EvidencePolicy::repo_map();
        assert!(
            policy
                .validate(&strings(&["alpha", "beta", "gamma", "delta"]), haystack, &[])
                .is_err()
        );

        let out = policy
            .validate(
                &strings(&["alpha", "beta", "gamma", "nope", "nah"]),
                haystack,
                &[],
            )
            .unwrap();
        assert_eq!(out, vec!["alpha", "beta", "gamma", "nah", "nope"]);

        assert!(
            policy
                .validate(&strings(&["alpha", "beta", "x", "y", "z"]), haystack, &[])
                .is_err()
        );
    }

    #[test]
    fn test_repo_map_counts_citations_before_dedupe() {
        let haystack = "src/core.py src/db.py class Engine: def main():";
        let out = EvidencePolicy::repo_map()
            .validate(
                &strings(&["src/core.py", "`src/core.py`", "src/db.py", "class Engine:", "def main():"]),
                haystack,
                &[],
            )
            .unwrap();
        assert_eq!(out, vec!["class Engine:", "def main():", "src/core.py", "src/db.py"]);

        let blanks = strings(&["src/core.py", "src/db.py", "class Engine:", " ", "``"]);
        assert!(EvidencePolicy::repo_map().validate(&blanks, haystack, &[]).is_err());
    }

    #[test]
    fn test_max_kept() {
        let haystack: String = (0..20).map(|i| format!("tok{i:02} ")).collect();
        let items: Vec<String> = (0..20).map(|i| format!("tok{i:02}")).collect();
        let out = EvidencePolicy::record(true)
            .with_max_kept(10)
            .validate(&items, &haystack, &[])
            .unwrap();
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn test_normalize_evidence() {
        let out = normalize_evidence(&strings(&["  `b` ", "a", "b", "", "``"]));
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn test_evidence_items_from_value() {
        assert_eq!(evidence_items(&json!(["a", 1, "b"])), vec!["a", "b"]);
        assert_eq!(evidence_items(&json!("only")), vec!["only"]);
        assert!(evidence_items(&json!(null)).is_empty());
    }
}
