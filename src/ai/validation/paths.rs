//! Path safety for model-chosen output locations.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::pipeline::SNAPSHOTS_DIR;
use crate::types::{GroundError, Result, ValidationErrorKind};

static SAFE_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").expect("category segment regex should compile")
});

/// Trim, convert `\` to `/`, strip leading and trailing `/`.
pub fn normalize_category(category: &str) -> String {
    category
        .trim()
        .replace('\\', "/")
        .trim_matches('/')
        .to_string()
}

/// Whether a (raw) category stays inside the docs root.
pub fn is_safe_category(category: &str) -> bool {
    if category.contains('\\') || category.contains(':') {
        return false;
    }
    let normalized = normalize_category(category);
    if normalized.is_empty() {
        return false;
    }
    normalized.split('/').all(|segment| {
        segment != "."
            && segment != ".."
            && !segment.starts_with('.')
            && segment != SNAPSHOTS_DIR
            && SAFE_SEGMENT.is_match(segment)
    })
}

/// Whether a file name is a bare markdown file name.
pub fn is_safe_file_name(file_name: &str) -> bool {
    let name = file_name.trim();
    name.ends_with(".md")
        && name.len() > 3
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}

/// Validate and normalize a category
pub fn check_category(category: &str) -> Result<String> {
    if !is_safe_category(category) {
        return Err(GroundError::validation(
            ValidationErrorKind::PathSafety,
            format!("unsafe target_category: {:?}", category),
        ));
    }
    Ok(normalize_category(category))
}

/// Validate and trim a file name. `index.md` is refused when `allow_index` is false.
pub fn check_file_name(file_name: &str, allow_index: bool) -> Result<String> {
    if !is_safe_file_name(file_name) {
        return Err(GroundError::validation(
            ValidationErrorKind::PathSafety,
            format!("invalid file_name: {:?}", file_name),
        ));
    }
    let name = file_name.trim();
    if !allow_index && name == "index.md" {
        return Err(GroundError::validation(
            ValidationErrorKind::PathSafety,
            "index.md is reserved",
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category(" /plugin_system/api/ "), "plugin_system/api");
    }

    #[test]
    fn test_safe_categories() {
        assert!(is_safe_category("modules"));
        assert!(is_safe_category("plugin_system/api"));
        assert!(is_safe_category("/core-2/"));
    }

    #[test]
    fn test_unsafe_categories() {
        for bad in [
            "",
            "../etc",
            "a/../b",
            ".hidden",
            "docs/.git",
            "snapshots",
            "a/snapshots",
            "a\\b",
            "C:",
            "with space",
            "_leading",
            "a//b",
        ] {
            assert!(!is_safe_category(bad), "{bad:?} should be unsafe");
        }
    }

    #[test]
    fn test_file_names() {
        assert!(is_safe_file_name("overview.md"));
        assert!(is_safe_file_name(" overview.md "));
        assert!(!is_safe_file_name("overview.txt"));
        assert!(!is_safe_file_name("a/b.md"));
        assert!(!is_safe_file_name("a\\b.md"));
        assert!(!is_safe_file_name("..md"));
        assert!(!is_safe_file_name(".md"));
    }

    #[test]
    fn test_check_file_name_index() {
        assert!(check_file_name("index.md", true).is_ok());
        assert!(matches!(
            check_file_name("index.md", false),
            Err(GroundError::Validation(_))
        ));
    }
}
