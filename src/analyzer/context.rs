//! Repository Context
//!
//! Builds the bounded text snapshot of a checkout that the repository-map
//! and single-pass prompts quote from. Every line counts against the
//! character budget; a section that runs out of room ends with a marker
//! and the remaining sections are still attempted when space allows.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::context::{
    MAX_FILE_BYTES, MAX_SIGNATURE_LINES, MAX_SNIPPET_FILES, TRUNCATED_MARKER,
};
use crate::constants::scanner::{ENTRY_STEMS, EXCLUDED_DIRS, TEXT_LIKE_SUFFIXES};

/// Read at most `max_bytes` of a text file.
///
/// Returns `None` for unreadable or binary files. Truncated text ends with
/// the truncation marker.
pub fn read_text_prefix(root: &Path, rel_path: &str, max_bytes: usize) -> Option<String> {
    let file = File::open(root.join(rel_path)).ok()?;
    let mut raw = Vec::with_capacity(max_bytes.min(64 * 1024) + 1);
    file.take(max_bytes as u64 + 1).read_to_end(&mut raw).ok()?;

    if raw.contains(&0) {
        return None;
    }

    let truncated = raw.len() > max_bytes;
    raw.truncate(max_bytes);
    let mut text = String::from_utf8_lossy(&raw).into_owned();
    if truncated {
        text.push_str("\n\n");
        text.push_str(TRUNCATED_MARKER);
    }
    Some(text)
}

/// Top-level declaration lines of a Python or Rust file
pub fn top_level_signatures(rel_path: &str, text: &str, max_lines: usize) -> Vec<String> {
    let prefixes: &[&str] = if rel_path.ends_with(".py") {
        &["def ", "async def ", "class "]
    } else if rel_path.ends_with(".rs") {
        &["pub fn ", "pub async fn ", "pub struct ", "pub enum ", "pub trait "]
    } else {
        return Vec::new();
    };

    text.lines()
        .filter(|line| prefixes.iter().any(|p| line.starts_with(p)))
        .map(|line| line.trim_end().to_string())
        .take(max_lines)
        .collect()
}

fn is_text_like(path: &str) -> bool {
    TEXT_LIKE_SUFFIXES.iter().any(|s| path.ends_with(s))
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

/// Line accumulator with a hard character budget
struct BoundedLines {
    lines: Vec<String>,
    total: usize,
    max: usize,
}

impl BoundedLines {
    fn new(max: usize) -> Self {
        Self {
            lines: Vec::new(),
            total: 0,
            max,
        }
    }

    /// Append one line; false when it would exceed the budget
    fn add(&mut self, line: &str) -> bool {
        let line = line.trim_end_matches('\n');
        let cost = line.chars().count() + 1;
        if self.total + cost > self.max {
            return false;
        }
        self.lines.push(line.to_string());
        self.total += cost;
        true
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

/// Builds the repository snapshot text
pub struct RepoContextBuilder {
    root: PathBuf,
    repo: String,
    branch: String,
    head: Option<String>,
    max_chars: usize,
    preferred_dir: Option<String>,
}

impl RepoContextBuilder {
    pub fn new(root: impl Into<PathBuf>, repo: &str, branch: &str, max_chars: usize) -> Self {
        Self {
            root: root.into(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            head: None,
            max_chars,
            preferred_dir: None,
        }
    }

    pub fn with_head(mut self, head: Option<&str>) -> Self {
        self.head = head.map(str::trim).filter(|h| !h.is_empty()).map(String::from);
        self
    }

    /// Files under this directory are quoted first
    pub fn with_preferred_dir(mut self, dir: Option<&str>) -> Self {
        self.preferred_dir = dir
            .map(|d| d.trim().trim_matches('/').to_string())
            .filter(|d| !d.is_empty());
        self
    }

    /// Pick up to `MAX_SNIPPET_FILES` high-signal text files
    pub fn select_snippet_files(&self, paths: &[String]) -> Vec<String> {
        let mut selected: Vec<String> = Vec::new();

        if let Some(dir) = &self.preferred_dir {
            let prefix = format!("{}/", dir);
            selected.extend(
                paths
                    .iter()
                    .filter(|p| p.starts_with(&prefix) && is_text_like(p))
                    .take(MAX_SNIPPET_FILES)
                    .cloned(),
            );
        }

        let mut entries: Vec<&String> = paths
            .iter()
            .filter(|p| is_text_like(p) && ENTRY_STEMS.contains(&file_stem(p)))
            .collect();
        entries.sort_by_key(|p| (p.matches('/').count(), p.as_str()));

        for path in entries {
            if selected.len() >= MAX_SNIPPET_FILES {
                break;
            }
            if !selected.contains(path) {
                selected.push(path.clone());
            }
        }

        selected
    }

    /// Render the snapshot for `paths` (sorted relative paths)
    pub fn build(&self, paths: &[String]) -> String {
        let mut out = BoundedLines::new(self.max_chars);

        let mut top_level: BTreeMap<&str, usize> = BTreeMap::new();
        for p in paths {
            let top = p.split('/').next().unwrap_or(p);
            *top_level.entry(top).or_default() += 1;
        }

        out.add(&format!("Repo: {}", self.repo));
        out.add(&format!("Branch: {}", self.branch));
        if let Some(head) = &self.head {
            out.add(&format!("Head: {}", head));
        }
        out.add("");
        out.add("Scan filters:");
        out.add(&format!(
            "- Exclude dirs: {}",
            EXCLUDED_DIRS
                .iter()
                .map(|d| format!("{}/", d))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        out.add("- Exclude files: *.md, *.toml, *.yaml, *.yml, *ignore, LICENSE");
        out.add("");
        out.add("Top-level entries (file count):");
        for (entry, count) in &top_level {
            if !out.add(&format!("- {}: {}", entry, count)) {
                out.add("...(truncated due to context size limit)...");
                return out.finish();
            }
        }
        out.add("");
        out.add(&format!("Included files: {}", paths.len()));
        out.add("");

        out.add("All included file paths:");
        for p in paths {
            if !out.add(&format!("- {}", p)) {
                out.add("...(truncated file list due to context size limit)...");
                break;
            }
        }

        let snippets: Vec<(String, String)> = self
            .select_snippet_files(paths)
            .into_iter()
            .filter_map(|p| {
                let text = read_text_prefix(&self.root, &p, MAX_FILE_BYTES)?;
                (!text.trim().is_empty()).then_some((p, text))
            })
            .collect();

        if !snippets.is_empty() {
            out.add("");
            out.add("Selected file snippets (for deeper verification):");
            'files: for (path, text) in &snippets {
                if !out.add(&format!("--- File: {} ---", path)) {
                    out.add("...(truncated snippets due to context size limit)...");
                    break;
                }
                out.add("```text");
                for line in text.lines() {
                    if !out.add(line) {
                        out.add(TRUNCATED_MARKER);
                        break 'files;
                    }
                }
                out.add("```");
            }
        }

        out.add("");
        out.add("Extracted top-level signatures (partial index):");
        'sigs: for path in paths {
            if !(path.ends_with(".py") || path.ends_with(".rs")) {
                continue;
            }
            let Some(text) = read_text_prefix(&self.root, path, MAX_FILE_BYTES) else {
                continue;
            };
            let sigs = top_level_signatures(path, &text, MAX_SIGNATURE_LINES);
            if sigs.is_empty() {
                continue;
            }
            if !out.add(&format!("--- {} ---", path)) {
                out.add("...(truncated signature index due to context size limit)...");
                break;
            }
            for sig in &sigs {
                if !out.add(sig) {
                    out.add("...(truncated signature index due to context size limit)...");
                    break 'sigs;
                }
            }
        }

        let text = out.finish();
        debug!(chars = text.chars().count(), files = paths.len(), "Built repository context");
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_read_text_prefix_truncates_and_skips_binary() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.txt", "abcdefghij");
        fs::write(temp.path().join("b.bin"), [1u8, 0, 2]).unwrap();

        let text = read_text_prefix(temp.path(), "a.txt", 4).unwrap();
        assert!(text.starts_with("abcd\n\n"));
        assert!(text.ends_with(TRUNCATED_MARKER));
        assert_eq!(read_text_prefix(temp.path(), "a.txt", 100).unwrap(), "abcdefghij");
        assert!(read_text_prefix(temp.path(), "b.bin", 100).is_none());
        assert!(read_text_prefix(temp.path(), "missing", 100).is_none());
    }

    #[test]
    fn test_signatures() {
        let py = "import os\nclass Engine:\n    def run(self):\n        pass\ndef main():\nasync def serve():\n";
        assert_eq!(
            top_level_signatures("src/app.py", py, 10),
            vec!["class Engine:", "def main():", "async def serve():"]
        );

        let rs = "use std::fs;\npub fn open() {}\n    pub fn inner() {}\npub struct Db;\nfn private() {}\n";
        assert_eq!(
            top_level_signatures("src/lib.rs", rs, 10),
            vec!["pub fn open() {}", "pub struct Db;"]
        );
        assert!(top_level_signatures("src/x.go", "func main() {}", 10).is_empty());
        assert_eq!(top_level_signatures("a.py", py, 1).len(), 1);
    }

    #[test]
    fn test_build_contains_sections() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/main.py", "def main():\n    return 1\n");
        write(temp.path(), "src/util.py", "class Helper:\n    pass\n");
        let paths = vec!["src/main.py".to_string(), "src/util.py".to_string()];

        let text = RepoContextBuilder::new(temp.path(), "org/repo", "main", 100_000)
            .with_head(Some("abc123"))
            .build(&paths);

        assert!(text.starts_with("Repo: org/repo\nBranch: main\nHead: abc123"));
        assert!(text.contains("- src: 2"));
        assert!(text.contains("Included files: 2"));
        assert!(text.contains("- src/util.py"));
        assert!(text.contains("--- File: src/main.py ---"));
        assert!(text.contains("--- src/util.py ---\nclass Helper:"));
    }

    #[test]
    fn test_build_respects_budget() {
        let temp = TempDir::new().unwrap();
        let paths: Vec<String> = (0..500).map(|i| format!("src/file_{:03}.py", i)).collect();
        let text = RepoContextBuilder::new(temp.path(), "org/repo", "main", 2_000).build(&paths);

        assert!(text.chars().count() <= 2_000);
        assert!(text.contains("- src/file_000.py"));
        assert!(!text.contains("- src/file_499.py"));
    }

    #[test]
    fn test_snippet_selection_prefers_dir_then_entry_points() {
        let builder = RepoContextBuilder::new(".", "r", "b", 1000).with_preferred_dir(Some("src/api/"));
        let paths = vec![
            "deep/nested/pkg/main.py".to_string(),
            "main.py".to_string(),
            "src/api/users.py".to_string(),
            "src/other.py".to_string(),
            "image.png".to_string(),
        ];
        assert_eq!(
            builder.select_snippet_files(&paths),
            vec!["src/api/users.py", "main.py", "deep/nested/pkg/main.py"]
        );
    }
}
