use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::scanner::{EXCLUDED_DIRS, EXCLUDED_EXTENSIONS};
use crate::types::{GroundError, Result};

/// Lists the files of a checkout that are worth documenting.
///
/// Skips the fixed excluded directories, markdown/config extensions, names
/// ending in `ignore`, and license files. Paths come back relative to the
/// root, `/`-separated, sorted and unique.
pub struct FileScanner {
    root: PathBuf,
    exclude: Vec<glob::Pattern>,
}

impl FileScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            exclude: Vec::new(),
        }
    }

    /// Additional glob excludes, matched against the relative path
    pub fn with_exclude(mut self, patterns: &[String]) -> Result<Self> {
        for pattern in patterns {
            let compiled = glob::Pattern::new(pattern).map_err(|e| {
                GroundError::Config(format!("invalid exclude pattern '{}': {}", pattern, e))
            })?;
            self.exclude.push(compiled);
        }
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative paths of every included file
    pub fn paths(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(GroundError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("repository directory not found: {}", self.root.display()),
            )));
        }

        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false) // Security: prevent symlink traversal attacks
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && entry.depth() > 0 && is_excluded_dir(&entry.file_name().to_string_lossy()))
            })
            .build();

        let mut included: Vec<String> = walker
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
            .filter_map(|entry| {
                let rel = entry.path().strip_prefix(&self.root).ok()?;
                let rel = rel.to_string_lossy().replace('\\', "/");
                let name = entry.file_name().to_string_lossy();
                (is_included_file(&name) && !self.matches_exclude(&rel)).then_some(rel)
            })
            .collect();

        included.sort();
        included.dedup();
        Ok(included)
    }

    fn matches_exclude(&self, rel: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(rel))
    }
}

fn is_excluded_dir(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name)
}

/// File-name filter shared by the scanner and its tests
pub fn is_included_file(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    if lower == "license" || lower.starts_with("license.") {
        return false;
    }
    if lower.ends_with("ignore") {
        return false;
    }
    match Path::new(&lower).extension().and_then(|e| e.to_str()) {
        Some(ext) => !EXCLUDED_EXTENSIONS.contains(&ext),
        None => true,
    }
}

/// Group relative paths by parent directory; root files go under `"."`.
pub fn group_by_dir(paths: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in paths {
        let p = path.trim().replace('\\', "/");
        let p = p.strip_prefix("./").unwrap_or(&p).to_string();
        if p.is_empty() {
            continue;
        }
        let dir = match p.rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => dir.to_string(),
            _ => ".".to_string(),
        };
        grouped.entry(dir).or_default().push(p);
    }
    for files in grouped.values_mut() {
        files.sort();
        files.dedup();
    }
    grouped
}
