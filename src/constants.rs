//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Network / transport constants
pub mod network {
    /// Per-call ceiling for a generation request (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

    /// Timeout for the connectivity ping (seconds)
    pub const PING_TIMEOUT_SECS: u64 = 60;

    /// Characters of an HTTP error body kept in error messages
    pub const HTTP_BODY_PREVIEW_CHARS: usize = 500;

    /// Default Gemini API version segment
    pub const DEFAULT_GEMINI_API_VERSION: &str = "v1beta";

    /// Default endpoint when none is configured
    pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

    /// Default model name
    pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
}

/// Retry controller constants
pub mod retry {
    /// Total attempts per request (first call included)
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Linear backoff step: wait `attempt * BASE_DELAY_SECS`
    pub const BASE_DELAY_SECS: u64 = 2;

    /// HTTP statuses the retry controller retries
    pub const RETRYABLE_STATUSES: &[u16] = &[403, 429];
}

/// Structured output negotiation constants
pub mod negotiation {
    /// Statuses that may signal a rejected `response_format`
    pub const REJECTION_STATUSES: &[u16] = &[400, 422];

    /// Body markers (lowercase) that identify a rejected `response_format`
    pub const REJECTION_MARKERS: &[&str] = &[
        "response_format",
        "json_schema",
        "json_object",
        "unknown parameter",
        "unrecognized",
        "unsupported",
        "not supported",
        "invalid",
    ];

    /// Maximum length of a `json_schema.name`
    pub const MAX_SCHEMA_NAME_LEN: usize = 64;

    /// Fallback schema name
    pub const DEFAULT_SCHEMA_NAME: &str = "output";
}

/// Tolerant extraction constants
pub mod extraction {
    /// Candidate start positions tried by the scanning strategy
    pub const MAX_SCAN_CANDIDATES: usize = 50;

    /// Passes of trailing-comma removal before giving up on a fixed point
    pub const TRAILING_COMMA_PASSES: usize = 5;

    /// Characters kept in a parse error preview
    pub const PARSE_PREVIEW_CHARS: usize = 300;
}

/// Evidence grounding constants
pub mod evidence {
    /// Minimum verified items for change / page / plan / directory records
    pub const RECORD_MIN_MATCHES: usize = 2;

    /// Minimum listed items for a repository map
    pub const REPO_MAP_MIN_ITEMS: usize = 5;

    /// Minimum verified items for a repository map
    pub const REPO_MAP_MIN_MATCHES: usize = 3;

    /// Evidence kept on a directory analysis
    pub const DIR_ANALYSIS_MAX_ITEMS: usize = 10;

    /// Header files considered for directory-analysis fallback evidence
    pub const DIR_FALLBACK_FILES: usize = 5;
}

/// Context chunking constants
pub mod chunking {
    /// Fixed reservation for prompt scaffolding
    pub const BASE_OVERHEAD_CHARS: usize = 12_000;

    /// Per-character weight of the directory path in the overhead
    pub const DIR_OVERHEAD_FACTOR: usize = 4;

    /// Floor for the per-chunk budget
    pub const MIN_BUDGET_CHARS: usize = 2_000;

    /// Part size as a fraction of the budget
    pub const PART_RATIO: f64 = 0.7;

    /// Floor for the part size
    pub const MIN_PART_CHARS: usize = 2_000;

    /// Hard sub-split size as a fraction of the budget
    pub const SPLIT_RATIO: f64 = 0.6;

    /// Floor for the hard sub-split size
    pub const MIN_SPLIT_CHARS: usize = 1_000;

    /// Bytes inspected for NUL when detecting binary files
    pub const BINARY_SNIFF_BYTES: usize = 4_096;

    /// Default and floor for the model context size in characters
    pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 120_000;
    pub const MIN_MAX_CONTEXT_CHARS: usize = 8_000;
}

/// Repository context constants
pub mod context {
    /// Bytes read from one file for snippets and signatures
    pub const MAX_FILE_BYTES: usize = 60_000;

    /// Signature lines collected per file
    pub const MAX_SIGNATURE_LINES: usize = 60;

    /// Files quoted as snippets in the repository context
    pub const MAX_SNIPPET_FILES: usize = 12;

    /// Bytes read from an API module
    pub const MAX_API_MODULE_BYTES: usize = 200_000;

    /// Existing-doc context limits
    pub const DOC_CONTEXT_MAX_FILES: usize = 40;
    pub const DOC_CONTEXT_MAX_CHARS_PER_FILE: usize = 2_000;
    pub const DOC_CONTEXT_MAX_TOTAL_CHARS: usize = 40_000;

    /// Marker appended to truncated text
    pub const TRUNCATED_MARKER: &str = "...[truncated]...";
}

/// Pipeline limits
pub mod pipeline {
    /// Default cap on planned pages
    pub const DEFAULT_MAX_PAGES: usize = 60;

    /// Items kept per repository map list when compacting
    pub const COMPACT_MODULE_GROUPS: usize = 30;
    pub const COMPACT_PUBLIC_SURFACES: usize = 60;
    pub const COMPACT_DOC_GROUPS: usize = 40;
    pub const COMPACT_EVIDENCE: usize = 20;

    /// Directory brief limits
    pub const BRIEF_MAX_CONTRACTS: usize = 30;
    pub const BRIEF_MAX_SUMMARY_CHARS: usize = 1_600;
    pub const BRIEF_MAX_EVIDENCE: usize = 20;

    /// Docs produced by the single-pass bootstrap fallback
    pub const SINGLE_PASS_MAX_DOCS: usize = 12;

    /// Diffs with at least this many lines are summarized first
    pub const LARGE_DIFF_LINES: usize = 500;

    /// Diff characters sent to the summarizer
    pub const DIFF_SUMMARY_INPUT_CHARS: usize = 30_000;

    /// Diff characters kept when summarizing fails
    pub const DIFF_TRUNCATE_CHARS: usize = 10_000;

    /// Diff characters shown to the relevance gate
    pub const RELEVANCE_DIFF_CHARS: usize = 2_000;

    /// Output cap for the relevance gate
    pub const RELEVANCE_MAX_TOKENS: u32 = 64;

    /// Relevance gate output when no global cap is set
    pub const RELEVANCE_DEFAULT_TOKENS: u32 = 10;

    /// Reserved snapshot directory under the docs root
    pub const SNAPSHOTS_DIR: &str = "snapshots";
}

/// Sampling / output length defaults
pub mod sampling {
    /// Temperature when a call does not set one
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Temperature used by pipeline stages
    pub const STAGE_TEMPERATURE: f32 = 0.2;

    /// Inclusive temperature range accepted by providers
    pub const MIN_TEMPERATURE: f32 = 0.0;
    pub const MAX_TEMPERATURE: f32 = 2.0;

    /// Default output cap for a stage call
    pub const DEFAULT_STAGE_MAX_TOKENS: u32 = 8_192;

    /// Default output cap for an ad-hoc call
    pub const DEFAULT_CALL_MAX_TOKENS: u32 = 2_048;
}

/// Repository scan filters
pub mod scanner {
    /// Directory names never descended into
    pub const EXCLUDED_DIRS: &[&str] = &[".git", ".github", ".devcontainer", "changelogs", "depends-data"];

    /// File extensions left out of the scan (lowercase, no dot)
    pub const EXCLUDED_EXTENSIONS: &[&str] = &["md", "toml", "yaml", "yml"];

    /// Suffixes read as text when picking snippet files
    pub const TEXT_LIKE_SUFFIXES: &[&str] = &[
        ".py", ".rs", ".go", ".ts", ".js", ".java", ".json", ".ini", ".cfg", ".txt", ".sh", ".env",
    ];

    /// File stems that usually mark an entry point or public surface
    pub const ENTRY_STEMS: &[&str] = &[
        "main", "lib", "mod", "__init__", "__main__", "app", "cli", "config", "settings", "server",
    ];
}

/// Diff path filters for the update relevance gate
pub mod diff_filter {
    pub const IGNORED_PREFIXES: &[&str] = &[
        ".github/", ".vscode/", "docs/", "doc/", "website/", "web/", "dashboard/", "frontend/",
        "front/", "ui/", "assets/",
    ];

    pub const IGNORED_FILES: &[&str] = &[
        "README.md",
        "README.zh.md",
        "CHANGELOG.md",
        "pnpm-lock.yaml",
        "package-lock.json",
        "yarn.lock",
        "package.json",
    ];

    pub const IGNORED_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".lock"];

    pub const FRONTEND_SUFFIXES: &[&str] = &[
        ".vue", ".ts", ".tsx", ".js", ".jsx", ".css", ".scss", ".less", ".html",
    ];
}
