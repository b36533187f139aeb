//! Context Chunking
//!
//! Partitions one directory's files into size-bounded chunks for analysis.
//!
//! ## Strategy
//! - Split each file up front into parts of at most `part_chars` characters
//! - Pack parts greedily; a part that does not fit flushes the current chunk
//! - Hard-split any rendered part that alone exceeds the budget
//! - Prefix each chunk with a header naming its directory, position and files
//!
//! Files are visited in the order given (callers pass sorted lists), so the
//! same input always yields identically numbered chunks.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::constants::chunking::{
    BASE_OVERHEAD_CHARS, BINARY_SNIFF_BYTES, DIR_OVERHEAD_FACTOR, MIN_BUDGET_CHARS,
    MIN_PART_CHARS, MIN_SPLIT_CHARS, PART_RATIO, SPLIT_RATIO,
};

// =============================================================================
// File Sources
// =============================================================================

/// Where chunk content comes from
pub trait FileSource {
    /// Full text of a file, or `None` when it is binary or unreadable
    fn read_text(&self, rel_path: &str) -> Option<String>;
}

/// Reads files relative to a repository root
#[derive(Debug, Clone)]
pub struct DiskSource {
    root: PathBuf,
}

impl DiskSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSource for DiskSource {
    fn read_text(&self, rel_path: &str) -> Option<String> {
        let bytes = fs::read(self.root.join(rel_path)).ok()?;
        if looks_binary(&bytes) {
            trace!(path = rel_path, "Skipping binary file");
            return None;
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// NUL byte within the sniff window
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_BYTES).any(|b| *b == 0)
}

impl<F> FileSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn read_text(&self, rel_path: &str) -> Option<String> {
        self(rel_path)
    }
}

// =============================================================================
// Budget
// =============================================================================

/// Character sizes derived from the model context size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBudget {
    /// Maximum serialized chunk body
    pub budget: usize,
    /// Part size for splitting files up front
    pub part_chars: usize,
    /// Sub-block size for oversized parts
    pub split_size: usize,
}

impl ChunkBudget {
    /// Budget left after the fixed prompt overhead for one directory.
    pub fn for_directory(max_context_chars: usize, repo_map_chars: usize, dir: &str) -> Self {
        let overhead =
            BASE_OVERHEAD_CHARS + repo_map_chars + dir.chars().count() * DIR_OVERHEAD_FACTOR;
        Self::from_budget(max_context_chars.saturating_sub(overhead))
    }

    pub fn from_budget(budget: usize) -> Self {
        let budget = budget.max(MIN_BUDGET_CHARS);
        Self {
            budget,
            part_chars: ((budget as f64 * PART_RATIO) as usize).max(MIN_PART_CHARS),
            split_size: ((budget as f64 * SPLIT_RATIO) as usize).max(MIN_SPLIT_CHARS),
        }
    }
}

// =============================================================================
// Chunks
// =============================================================================

/// An ordered batch of file parts from one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub dir: String,
    /// 1-based
    pub index: usize,
    pub total: usize,
    /// Sorted, deduplicated
    pub files: Vec<String>,
    /// Rendered file blocks (without header)
    pub body: String,
}

impl FileChunk {
    pub fn header(&self) -> String {
        let mut out = format!(
            "Directory: {}\nChunk: {}/{}\nFiles in this chunk:\n",
            self.dir, self.index, self.total
        );
        for path in &self.files {
            out.push_str("- ");
            out.push_str(path);
            out.push('\n');
        }
        out.push('\n');
        out
    }

    /// Header followed by body; this is the text sent to the model
    pub fn render(&self) -> String {
        let mut out = self.header();
        out.push_str(&self.body);
        out
    }

    pub fn body_chars(&self) -> usize {
        self.body.chars().count()
    }
}

/// File list recovered from a rendered chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkHeader {
    pub dir: Option<String>,
    pub index: Option<usize>,
    pub total: Option<usize>,
    pub files: Vec<String>,
}

impl ChunkHeader {
    /// Parse the header of a rendered chunk. The file list ends at the first
    /// line that is not a `- ` item; files come back sorted and deduplicated.
    pub fn parse(block: &str) -> Self {
        let mut header = ChunkHeader::default();
        let mut in_list = false;

        for line in block.lines() {
            let line = line.trim();
            if in_list {
                match line.strip_prefix("- ") {
                    Some(path) if !path.trim().is_empty() => {
                        header.files.push(path.trim().to_string())
                    }
                    _ => break,
                }
                continue;
            }
            if let Some(dir) = line.strip_prefix("Directory:") {
                header.dir = Some(dir.trim().to_string());
            } else if let Some(pos) = line.strip_prefix("Chunk:") {
                if let Some((i, n)) = pos.trim().split_once('/') {
                    header.index = i.trim().parse().ok();
                    header.total = n.trim().parse().ok();
                }
            } else if line == "Files in this chunk:" {
                in_list = true;
            }
        }

        header.files.sort();
        header.files.dedup();
        header
    }
}

// =============================================================================
// Chunker
// =============================================================================

struct Part<'a> {
    path: &'a str,
    index: usize,
    total: usize,
    text: String,
}

#[derive(Default)]
struct Packer {
    blocks: Vec<String>,
    files: Vec<String>,
    chars: usize,
    done: Vec<(Vec<String>, String)>,
}

impl Packer {
    fn push(&mut self, path: &str, block: String, budget: usize) {
        // Blocks are joined with one newline
        let len = block.chars().count();
        if !self.blocks.is_empty() && self.chars + 1 + len > budget {
            self.flush();
        }
        self.chars += len + usize::from(!self.blocks.is_empty());
        self.blocks.push(block);
        self.files.push(path.to_string());
    }

    fn flush(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        let mut files = std::mem::take(&mut self.files);
        files.sort();
        files.dedup();
        let body = format!("{}\n", self.blocks.join("\n").trim());
        self.blocks.clear();
        self.chars = 0;
        self.done.push((files, body));
    }
}

pub struct ContextChunker<S> {
    source: S,
}

impl<S: FileSource> ContextChunker<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Chunk the given files of `dir` within `budget`.
    pub fn chunk_dir(&self, dir: &str, files: &[String], budget: ChunkBudget) -> Vec<FileChunk> {
        let parts = self.read_parts(files, budget.part_chars);
        let mut packer = Packer::default();

        for part in &parts {
            let block = render_block(part.path, part.index, part.total, None, &part.text);
            if block.chars().count() <= budget.budget {
                packer.push(part.path, block, budget.budget);
                continue;
            }

            // Oversized even alone: hard-split into fixed sub-blocks
            for (k, sub) in split_chars(&part.text, budget.split_size).iter().enumerate() {
                let block = render_block(part.path, part.index, part.total, Some(k + 1), sub);
                packer.push(part.path, block, budget.budget);
            }
        }
        packer.flush();

        let total = packer.done.len();
        debug!(dir, files = files.len(), chunks = total, budget = budget.budget, "Chunked directory");

        packer
            .done
            .into_iter()
            .enumerate()
            .map(|(i, (files, body))| FileChunk {
                dir: dir.to_string(),
                index: i + 1,
                total,
                files,
                body,
            })
            .collect()
    }

    fn read_parts<'a>(&self, files: &'a [String], part_chars: usize) -> Vec<Part<'a>> {
        let mut parts = Vec::new();
        for path in files {
            let Some(text) = self.source.read_text(path) else {
                continue;
            };
            let pieces = split_chars(&text, part_chars);
            let total = pieces.len();
            for (i, piece) in pieces.into_iter().enumerate() {
                parts.push(Part {
                    path,
                    index: i + 1,
                    total,
                    text: piece,
                });
            }
        }
        parts
    }
}

fn render_block(path: &str, index: usize, total: usize, sub: Option<usize>, text: &str) -> String {
    let label = match sub {
        Some(k) => format!("part {}/{}, sub {}", index, total, k),
        None => format!("part {}/{}", index, total),
    };
    format!(
        "--- File: {} ({}) ---\n```text\n{}\n```\n",
        path,
        label,
        text.trim_end_matches('\n')
    )
}

/// Consecutive slices of at most `size` characters. Empty text yields one
/// empty slice so the file is still listed.
fn split_chars(text: &str, size: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}
