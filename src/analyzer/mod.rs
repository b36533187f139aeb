//! Repository Analyzer
//!
//! Local, model-free inspection of a checkout:
//! - File scanning with fixed and configurable excludes
//! - Bounded repository context for the repo-map and single-pass prompts
//! - Diff path extraction and the path-only relevance filter

pub mod context;
pub mod diff;
pub mod scanner;

pub use context::{RepoContextBuilder, read_text_prefix, top_level_signatures};
pub use diff::{changed_paths, is_ignored_path, should_skip_by_paths};
pub use scanner::{FileScanner, group_by_dir};
