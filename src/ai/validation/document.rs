//! Markdown document checks
//!
//! Generated pages must open with a YAML frontmatter block and carry the
//! section headings required for their kind.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{GroundError, Result, ValidationError, ValidationErrorKind};

static TITLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*title\s*:\s*)(.+?)\s*$").expect("title line regex should compile")
});

/// What a document was generated as; decides the required sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    /// Single-pass bootstrap doc
    Bootstrap,
    /// Page generated from a plan item
    PlanPage,
    /// Per-module API page
    ApiPage,
    /// Page written by the update pipeline
    Change,
}

impl DocKind {
    pub fn required_sections(self) -> &'static [&'static str] {
        match self {
            DocKind::Bootstrap => &["## Overview", "## Structure", "## Scope", "## Change Impact"],
            DocKind::PlanPage => &[
                "## Overview",
                "## Structure",
                "## Scope",
                "## Change Impact",
                "## Evidence",
            ],
            DocKind::ApiPage => &[
                "## Overview",
                "## API List",
                "## Calling Conventions",
                "## Change Impact",
                "## Evidence",
            ],
            DocKind::Change => &["## Change Impact"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Feature,
    Improvement,
    Refactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Stable,
    Experimental,
}

/// Frontmatter fields every page must carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub status: DocStatus,
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_base: Option<String>,
}

/// Split `content` into (frontmatter yaml, body). `None` when there is no
/// closed `---` block at the top.
pub fn split_frontmatter(content: &str) -> Option<(String, String)> {
    let content = content.trim_start_matches('\u{feff}').trim_start();
    let lines: Vec<&str> = content.lines().collect();
    if lines.first()?.trim() != "---" {
        return None;
    }
    let end = lines.iter().skip(1).position(|l| l.trim() == "---")? + 1;
    Some((lines[1..end].join("\n"), lines[end + 1..].join("\n")))
}

/// Parse and check the frontmatter of a page.
pub fn parse_frontmatter(content: &str) -> Result<Frontmatter> {
    let sanitized = sanitize_frontmatter(content);
    let (yaml, _) = split_frontmatter(&sanitized).ok_or_else(|| {
        GroundError::validation(
            ValidationErrorKind::Format,
            "content must start with a closed YAML frontmatter block ('---')",
        )
    })?;

    let fm: Frontmatter = serde_yaml::from_str(&yaml).map_err(|e| {
        GroundError::validation(ValidationErrorKind::Format, format!("invalid frontmatter: {}", e))
    })?;

    if fm.title.trim().is_empty() {
        return Err(GroundError::Validation(
            ValidationError::new(
                ValidationErrorKind::MissingField,
                "frontmatter title must not be empty",
            )
            .with_field("title"),
        ));
    }
    if fm.last_updated.trim().is_empty() {
        return Err(GroundError::Validation(
            ValidationError::new(
                ValidationErrorKind::MissingField,
                "frontmatter last_updated must not be empty",
            )
            .with_field("last_updated"),
        ));
    }

    Ok(fm)
}

/// Full content check for a generated page.
pub fn check_document(content: &str, kind: DocKind) -> Result<Frontmatter> {
    if content.trim().is_empty() {
        return Err(GroundError::validation(
            ValidationErrorKind::MissingField,
            "content must be a non-empty string",
        ));
    }
    if !content
        .trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with("---")
    {
        return Err(GroundError::validation(
            ValidationErrorKind::Format,
            "content must start with YAML frontmatter ('---')",
        ));
    }

    let fm = parse_frontmatter(content)?;

    for section in kind.required_sections() {
        if !has_heading(content, section) {
            return Err(GroundError::validation(
                ValidationErrorKind::Format,
                format!("content must include section: {}", section),
            ));
        }
    }

    Ok(fm)
}

fn has_heading(content: &str, heading: &str) -> bool {
    content.lines().any(|line| {
        line.trim_start()
            .strip_prefix(heading)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

/// Quote a YAML scalar so that colons and other indicators survive.
pub fn quote_yaml_string(value: &str) -> String {
    let v = value.trim();
    if v.is_empty() {
        return "\"\"".to_string();
    }
    let quoted_with = |q: char| v.len() >= 2 && v.starts_with(q) && v.ends_with(q);
    if quoted_with('"') || quoted_with('\'') {
        return v.to_string();
    }
    if !v.contains('"') {
        return format!("\"{}\"", v);
    }
    if !v.contains('\'') {
        return format!("'{}'", v);
    }
    format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Strip a BOM and quote an unquoted `title:` value in the frontmatter.
///
/// Content without a closed frontmatter block is returned unchanged
/// (BOM aside).
pub fn sanitize_frontmatter(content: &str) -> String {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if content.trim().is_empty() {
        return content.to_string();
    }

    let lines: Vec<&str> = content.lines().collect();
    if lines.first().map(|l| l.trim()) != Some("---") {
        return content.to_string();
    }
    let Some(end) = lines.iter().skip(1).position(|l| l.trim() == "---").map(|p| p + 1) else {
        return content.to_string();
    };

    let mut changed = false;
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    out.push(lines[0].to_string());
    for line in &lines[1..end] {
        if let Some(caps) = TITLE_LINE.captures(line) {
            let prefix = &caps[1];
            let value = caps[2].trim();
            let already_quoted = value.starts_with(['"', '\'']) && value.ends_with(['"', '\'']);
            if !value.is_empty() && !already_quoted {
                out.push(format!("{}{}", prefix, quote_yaml_string(value)));
                changed = true;
                continue;
            }
        }
        out.push(line.to_string());
    }

    if !changed {
        return content.to_string();
    }

    out.extend(lines[end..].iter().map(|l| l.to_string()));
    let mut joined = out.join("\n");
    if content.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(title_line: &str, sections: &[&str]) -> String {
        let mut s = format!(
            "---\n{}\ntype: feature\nstatus: stable\nlast_updated: 2025-01-01\n---\n\n# Page\n",
            title_line
        );
        for sec in sections {
            s.push_str(&format!("\n{}\n\ntext\n", sec));
        }
        s
    }

    #[test]
    fn test_check_bootstrap_document() {
        let content = page(
            "title: Core: Engine",
            DocKind::Bootstrap.required_sections(),
        );
        let fm = check_document(&content, DocKind::Bootstrap).unwrap();
        assert_eq!(fm.title, "Core: Engine");
        assert_eq!(fm.doc_type, DocType::Feature);
        assert_eq!(fm.status, DocStatus::Stable);
        assert_eq!(fm.last_updated, "2025-01-01");
    }

    #[test]
    fn test_missing_section() {
        let content = page("title: X", &["## Overview", "## Structure", "## Scope"]);
        let err = check_document(&content, DocKind::Bootstrap).unwrap_err();
        assert!(err.to_string().contains("## Change Impact"));
    }

    #[test]
    fn test_plan_page_needs_evidence_section() {
        let content = page("title: X", DocKind::Bootstrap.required_sections());
        assert!(check_document(&content, DocKind::PlanPage).is_err());
        assert!(check_document(&content, DocKind::Change).is_ok());
    }

    #[test]
    fn test_heading_prefix_must_be_whole_word() {
        assert!(has_heading("## Overview\n", "## Overview"));
        assert!(has_heading("  ## Overview of core", "## Overview"));
        assert!(!has_heading("## Overviews", "## Overview"));
        assert!(!has_heading("text ## Overview", "## Overview"));
    }

    #[test]
    fn test_no_frontmatter() {
        assert!(check_document("# Title\n## Overview", DocKind::Change).is_err());
        assert!(check_document("   ", DocKind::Change).is_err());
        assert!(check_document("---\ntitle: x\n", DocKind::Change).is_err());
    }

    #[test]
    fn test_invalid_type_rejected() {
        let content =
            "---\ntitle: X\ntype: essay\nstatus: stable\nlast_updated: 2025-01-01\n---\n## Change Impact\n";
        assert!(check_document(content, DocKind::Change).is_err());
    }

    #[test]
    fn test_missing_status_rejected() {
        let content = "---\ntitle: X\ntype: feature\nlast_updated: 2025-01-01\n---\n## Change Impact\n";
        assert!(check_document(content, DocKind::Change).is_err());
    }

    #[test]
    fn test_related_base_optional() {
        let content = "---\ntitle: X\ntype: refactor\nstatus: experimental\nlast_updated: 2025-01-01\nrelated_base: core/engine.md\n---\n## Change Impact\n";
        let fm = check_document(content, DocKind::Change).unwrap();
        assert_eq!(fm.related_base.as_deref(), Some("core/engine.md"));
    }

    #[test]
    fn test_quote_yaml_string() {
        assert_eq!(quote_yaml_string("Plain"), "\"Plain\"");
        assert_eq!(quote_yaml_string("Say \"hi\""), "'Say \"hi\"'");
        assert_eq!(
            quote_yaml_string("It's \"x\""),
            "\"It's \\\"x\\\"\""
        );
        assert_eq!(quote_yaml_string("'kept'"), "'kept'");
        assert_eq!(quote_yaml_string("  "), "\"\"");
    }

    #[test]
    fn test_sanitize_frontmatter() {
        let content = "\u{feff}---\ntitle: A: B\ntype: feature\n---\nbody\n";
        let out = sanitize_frontmatter(content);
        assert_eq!(out, "---\ntitle: \"A: B\"\ntype: feature\n---\nbody\n");
    }

    #[test]
    fn test_sanitize_frontmatter_untouched() {
        let quoted = "---\ntitle: \"A\"\n---\nbody";
        assert_eq!(sanitize_frontmatter(quoted), quoted);
        let open = "---\ntitle: A\nbody";
        assert_eq!(sanitize_frontmatter(open), open);
        let none = "# title: A";
        assert_eq!(sanitize_frontmatter(none), none);
    }

    #[test]
    fn test_sanitize_only_touches_frontmatter() {
        let content = "---\ntitle: A\n---\ntitle: body line\n";
        let out = sanitize_frontmatter(content);
        assert_eq!(out, "---\ntitle: \"A\"\n---\ntitle: body line\n");
    }

    #[test]
    fn test_split_frontmatter() {
        let (yaml, body) = split_frontmatter("---\na: 1\n---\nbody\nmore").unwrap();
        assert_eq!(yaml, "a: 1");
        assert_eq!(body, "body\nmore");
    }
}
