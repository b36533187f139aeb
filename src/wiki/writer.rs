//! Documentation tree writer.
//!
//! Every path is built from a validated category and a bare file name, so
//! nothing is written outside the docs root or into `snapshots/`.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::{info, warn};

use crate::ai::validation::{
    check_category, check_file_name, is_safe_category, normalize_category, sanitize_frontmatter,
    split_frontmatter,
};
use crate::config::DocsConfig;
use crate::constants::context::TRUNCATED_MARKER;
use crate::constants::pipeline::SNAPSHOTS_DIR;
use crate::types::{ChangeAction, ChangeRecord, DocPage, Result, WrittenDoc, truncate_chars};

/// Limits for the existing-docs prompt context
#[derive(Debug, Clone, Copy)]
pub struct DocContextLimits {
    pub max_files: usize,
    pub max_chars_per_file: usize,
    pub max_total_chars: usize,
}

impl From<&DocsConfig> for DocContextLimits {
    fn from(docs: &DocsConfig) -> Self {
        Self {
            max_files: docs.context_max_files,
            max_chars_per_file: docs.context_max_chars_per_file,
            max_total_chars: docs.context_max_total_chars,
        }
    }
}

pub struct DocWriter {
    root: PathBuf,
    default_category: String,
}

impl DocWriter {
    pub fn new(root: impl Into<PathBuf>, default_category: &str) -> Self {
        Self {
            root: root.into(),
            default_category: normalize_category(default_category),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `content` to `root/category/file`, overwriting.
    pub fn write_markdown(&self, category: &str, file_name: &str, content: &str) -> Result<PathBuf> {
        let category = check_category(category)?;
        let file_name = check_file_name(file_name, true)?;
        let path = self.root.join(&category).join(&file_name);
        self.write_at(&path, content)?;
        Ok(path)
    }

    /// Write a generated page as a create
    pub fn write_page(&self, page: &DocPage) -> Result<WrittenDoc> {
        let path = self.write_markdown(&page.target_category, &page.file_name, &page.content)?;
        Ok(WrittenDoc {
            title: extract_title(&page.content, &page.file_name),
            path,
            action: ChangeAction::Create,
        })
    }

    /// Apply a change record.
    ///
    /// `update` targets the preferred path when it exists, otherwise the first
    /// same-named file under the root; with no match it becomes a create.
    pub fn apply_change(&self, change: &ChangeRecord) -> Result<WrittenDoc> {
        let file_name = check_file_name(&change.file_name, change.action != ChangeAction::Create)?;

        let category = if is_safe_category(&change.target_category) {
            normalize_category(&change.target_category)
        } else {
            warn!(
                category = %change.target_category,
                default = %self.default_category,
                "Unsafe category, using default"
            );
            self.default_category.clone()
        };

        let mut action = change.action;
        let mut path = None;
        if action == ChangeAction::Update {
            let preferred = self.root.join(&category).join(&file_name);
            path = if preferred.is_file() {
                Some(preferred)
            } else {
                self.find_by_name(&file_name)
            };
            if path.is_none() {
                warn!(file = %file_name, "Update target not found, creating instead");
                action = ChangeAction::Create;
            }
        }

        let path = match path {
            Some(path) => path,
            None => {
                check_category(&category)?;
                self.root.join(&category).join(&file_name)
            }
        };

        self.write_at(&path, &change.content)?;
        info!(action = %action, path = %path.display(), "Applied doc change");
        Ok(WrittenDoc {
            title: extract_title(&change.content, &file_name),
            path,
            action,
        })
    }

    /// Existing markdown under the root (excluding snapshots) for prompts.
    ///
    /// Files are read in sorted order; the first file that would overflow
    /// the total budget ends the context.
    pub fn existing_docs_context(&self, limits: DocContextLimits) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut total = 0;

        for path in self.markdown_files() {
            let Ok(text) = fs::read_to_string(&path) else {
                continue;
            };
            let text = if text.chars().count() > limits.max_chars_per_file {
                format!(
                    "{}\n\n{}",
                    truncate_chars(&text, limits.max_chars_per_file),
                    TRUNCATED_MARKER
                )
            } else {
                text
            };
            let rel = path.strip_prefix(&self.root).unwrap_or(&path);
            let part = format!("--- Doc: {} ---\n{}", rel.to_string_lossy().replace('\\', "/"), text);

            let len = part.chars().count();
            if total + len > limits.max_total_chars {
                break;
            }
            total += len;
            parts.push(part);
            if parts.len() >= limits.max_files {
                break;
            }
        }

        parts.join("\n\n")
    }

    fn write_at(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, sanitize_frontmatter(content))?;
        Ok(())
    }

    fn find_by_name(&self, file_name: &str) -> Option<PathBuf> {
        let matches: Vec<PathBuf> = self
            .markdown_files()
            .into_iter()
            .filter(|p| p.file_name().is_some_and(|n| n == file_name))
            .collect();
        if matches.len() > 1 {
            warn!(file = file_name, count = matches.len(), "Multiple matches, picking the first");
        }
        matches.into_iter().next()
    }

    /// Sorted markdown files under the root, skipping `snapshots/`
    fn markdown_files(&self) -> Vec<PathBuf> {
        if !self.root.is_dir() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(|entry| entry.depth() == 0 || entry.file_name() != SNAPSHOTS_DIR)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
            .collect();
        files.sort();
        files
    }
}

/// Frontmatter title, or the file stem
pub fn extract_title(content: &str, file_name: &str) -> String {
    split_frontmatter(content)
        .and_then(|(yaml, _)| {
            yaml.lines().find_map(|line| {
                line.trim()
                    .strip_prefix("title:")
                    .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            })
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| file_name.trim_end_matches(".md").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAGE: &str = "---\ntitle: Users: API\ntype: feature\nstatus: stable\nlast_updated: 2025-01-01\n---\n\n## Change Impact\n";

    fn change(action: ChangeAction, category: &str, file: &str) -> ChangeRecord {
        ChangeRecord {
            action,
            target_category: category.into(),
            file_name: file.into(),
            content: PAGE.into(),
            evidence: vec![],
            reason: String::new(),
        }
    }

    #[test]
    fn test_write_markdown_sanitizes_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let writer = DocWriter::new(dir.path(), "modules");

        let path = writer.write_markdown("/guides/api/", "users.md", PAGE).unwrap();
        assert_eq!(path, dir.path().join("guides/api/users.md"));
        let first = fs::read_to_string(&path).unwrap();
        assert!(first.contains("title: \"Users: API\""));

        writer.write_markdown("guides/api", "users.md", PAGE).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn test_write_markdown_rejects_unsafe_paths() {
        let dir = TempDir::new().unwrap();
        let writer = DocWriter::new(dir.path(), "modules");
        assert!(writer.write_markdown("../x", "a.md", PAGE).is_err());
        assert!(writer.write_markdown("snapshots", "a.md", PAGE).is_err());
        assert!(writer.write_markdown("core", "sub/a.md", PAGE).is_err());
        assert!(writer.write_markdown("core", "a.txt", PAGE).is_err());
    }

    #[test]
    fn test_update_finds_existing_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("guides")).unwrap();
        fs::create_dir_all(dir.path().join("snapshots/v1")).unwrap();
        fs::write(dir.path().join("snapshots/v1/users.md"), "old").unwrap();
        fs::write(dir.path().join("guides/users.md"), "old").unwrap();
        let writer = DocWriter::new(dir.path(), "modules");

        let written = writer.apply_change(&change(ChangeAction::Update, "api", "users.md")).unwrap();
        assert_eq!(written.path, dir.path().join("guides/users.md"));
        assert_eq!(written.action, ChangeAction::Update);
        assert_eq!(written.title, "Users: API");
        assert_eq!(fs::read_to_string(dir.path().join("snapshots/v1/users.md")).unwrap(), "old");
    }

    #[test]
    fn test_update_without_target_creates() {
        let dir = TempDir::new().unwrap();
        let writer = DocWriter::new(dir.path(), "modules");

        let written = writer.apply_change(&change(ChangeAction::Update, "api", "users.md")).unwrap();
        assert_eq!(written.action, ChangeAction::Create);
        assert_eq!(written.path, dir.path().join("api/users.md"));
    }

    #[test]
    fn test_unsafe_category_uses_default() {
        let dir = TempDir::new().unwrap();
        let writer = DocWriter::new(dir.path(), "modules");

        let written = writer.apply_change(&change(ChangeAction::Create, "../../etc", "users.md")).unwrap();
        assert_eq!(written.path, dir.path().join("modules/users.md"));
    }

    #[test]
    fn test_existing_docs_context_limits() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("snapshots")).unwrap();
        fs::write(dir.path().join("a/one.md"), "x".repeat(50)).unwrap();
        fs::write(dir.path().join("a/two.md"), "short").unwrap();
        fs::write(dir.path().join("a/skip.txt"), "nope").unwrap();
        fs::write(dir.path().join("snapshots/old.md"), "frozen").unwrap();
        let writer = DocWriter::new(dir.path(), "modules");

        let limits = DocContextLimits {
            max_files: 10,
            max_chars_per_file: 10,
            max_total_chars: 1_000,
        };
        let context = writer.existing_docs_context(limits);
        assert!(context.starts_with("--- Doc: a/one.md ---\nxxxxxxxxxx\n\n...[truncated]..."));
        assert!(context.contains("--- Doc: a/two.md ---\nshort"));
        assert!(!context.contains("frozen"));
        assert!(!context.contains("nope"));

        let one_file = DocContextLimits { max_files: 1, ..limits };
        assert!(!writer.existing_docs_context(one_file).contains("two.md"));

        let missing = DocWriter::new(dir.path().join("missing"), "modules");
        assert_eq!(missing.existing_docs_context(limits), "");
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title(PAGE, "users.md"), "Users: API");
        assert_eq!(extract_title("no frontmatter", "users.md"), "users");
    }
}
