//! Diff path helpers for the update pipeline.

use regex::Regex;
use std::sync::LazyLock;

use crate::constants::diff_filter::{
    FRONTEND_SUFFIXES, IGNORED_FILES, IGNORED_PREFIXES, IGNORED_SUFFIXES,
};

static DIFF_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^diff --git a/(.+?) b/(.+?)$").expect("diff header regex should compile")
});

/// Both sides of every `diff --git a/X b/Y` line, deduplicated in order
pub fn changed_paths(diff: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for caps in DIFF_HEADER.captures_iter(diff) {
        for side in [&caps[1], &caps[2]] {
            let p = side.trim();
            if !p.is_empty() && !paths.iter().any(|existing| existing == p) {
                paths.push(p.to_string());
            }
        }
    }
    paths
}

fn has_suffix(path: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|s| path.ends_with(s))
}

/// Paths whose changes never affect developer documentation
pub fn is_ignored_path(path: &str) -> bool {
    let p = path.strip_prefix("./").unwrap_or(path);
    IGNORED_FILES.contains(&p)
        || IGNORED_PREFIXES.iter().any(|prefix| p.starts_with(prefix))
        || has_suffix(p, IGNORED_SUFFIXES)
        || has_suffix(p, FRONTEND_SUFFIXES)
}

/// True when the diff touches paths and every one of them is ignorable
pub fn should_skip_by_paths(paths: &[String]) -> bool {
    !paths.is_empty() && paths.iter().all(|p| is_ignored_path(p))
}
