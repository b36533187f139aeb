//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides status classification for retry and diagnostic decisions.
//!
//! ## Error Taxonomy
//!
//! - **Transport/HTTP**: network failures and non-2xx responses (run-fatal
//!   once retries are exhausted)
//! - **Parse**: no structured value could be recovered from model output
//! - **Validation**: a parsed record failed schema, evidence or path checks
//! - **Config**: missing or malformed configuration (fatal at startup)
//!
//! Parse and validation errors are scoped to a single document; the
//! pipeline logs them and moves on to the next document.

use std::time::Duration;
use thiserror::Error;

use crate::constants::{extraction, network, retry};

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories used for routing and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 429 - provider throttling
    RateLimit,
    /// 401 - bad or missing credential
    Auth,
    /// 403 - key lacks permission or region is blocked
    Permission,
    /// Other 4xx - request rejected as malformed
    BadRequest,
    /// 5xx - upstream failure
    Upstream,
    /// Connection, decode or timeout failures below HTTP
    Network,
    /// Model output could not be parsed
    Parse,
    /// Parsed output failed validation
    Validation,
    /// Configuration problem
    Config,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Permission => write!(f, "PERMISSION"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Upstream => write!(f, "UPSTREAM"),
            Self::Network => write!(f, "NETWORK"),
            Self::Parse => write!(f, "PARSE_ERROR"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Config => write!(f, "CONFIG"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// =============================================================================
// HTTP Failure
// =============================================================================

/// Non-2xx provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFailure {
    pub status: u16,
    pub body: String,
}

impl HttpFailure {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Trimmed body bounded to the preview length
    pub fn preview(&self) -> String {
        let trimmed = self.body.trim();
        if trimmed.chars().count() > network::HTTP_BODY_PREVIEW_CHARS {
            let head: String = trimmed
                .chars()
                .take(network::HTTP_BODY_PREVIEW_CHARS)
                .collect();
            format!("{}...", head)
        } else {
            trimmed.to_string()
        }
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorClassifier::classify_http_status(self.status)
    }
}

impl std::fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.preview())
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps HTTP statuses to categories and user-facing hints
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn classify_http_status(status: u16) -> ErrorCategory {
        match status {
            401 => ErrorCategory::Auth,
            403 => ErrorCategory::Permission,
            429 => ErrorCategory::RateLimit,
            500..=599 => ErrorCategory::Upstream,
            400..=499 => ErrorCategory::BadRequest,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Guidance printed next to an HTTP failure. Never changes the outcome.
    pub fn diagnostic_hint(status: u16) -> Option<&'static str> {
        match status {
            401 => Some("API key is invalid; check GEMINI_API_KEY / OPENAI_API_KEY or llm.api_key"),
            403 => Some(
                "Permission denied or blocked; check the key's permissions and the caller's region/IP",
            ),
            429 => Some("Rate limited; retry later or switch to another API key"),
            s if s >= 500 => Some("Upstream server error; retry later"),
            _ => None,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Structured validation error with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// What validation failed
    pub kind: ValidationErrorKind,
    /// Field that failed validation
    pub field: Option<String>,
    /// Detailed message
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "Validation failed for '{}': {}", field, self.message)
        } else {
            write!(f, "Validation failed: {}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: None,
            message: message.into(),
        }
    }

    /// Add field context
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Validation error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Value has the wrong shape (object vs array, wrong field type)
    Schema,
    /// Required field missing or empty
    MissingField,
    /// Field present but malformed (frontmatter, sections, enum values)
    Format,
    /// Too few evidence items found in the haystack
    Evidence,
    /// Category or file name escapes the docs root
    PathSafety,
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum GroundError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("{0}")]
    Http(HttpFailure),

    /// Network, decode or response-shape failure below HTTP status level
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Document Errors
    // -------------------------------------------------------------------------
    #[error("Parse error: {message} | preview={preview}")]
    Parse { message: String, preview: String },

    #[error("{0}")]
    Validation(ValidationError),

    // -------------------------------------------------------------------------
    // Startup Errors
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),
}

impl From<ValidationError> for GroundError {
    fn from(err: ValidationError) -> Self {
        GroundError::Validation(err)
    }
}

impl From<HttpFailure> for GroundError {
    fn from(err: HttpFailure) -> Self {
        GroundError::Http(err)
    }
}

impl From<reqwest::Error> for GroundError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return GroundError::Transport(format!("request timed out: {}", err));
        }
        GroundError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GroundError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl GroundError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http(HttpFailure::new(status, body))
    }

    /// Create a parse error; the preview is bounded and newline-escaped
    pub fn parse(message: impl Into<String>, raw: &str) -> Self {
        let preview = raw
            .chars()
            .take(extraction::PARSE_PREVIEW_CHARS)
            .collect::<String>()
            .replace('\n', "\\n");
        Self::Parse {
            message: message.into(),
            preview,
        }
    }

    pub fn validation(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(kind, message))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http(failure) => failure.category(),
            Self::Transport(_) | Self::Timeout { .. } => ErrorCategory::Network,
            Self::Parse { .. } | Self::Json(_) | Self::Yaml(_) => ErrorCategory::Parse,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Config(_) => ErrorCategory::Config,
            Self::Io(_) => ErrorCategory::Unknown,
        }
    }

    /// HTTP status, when this is an HTTP failure
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(failure) => Some(failure.status),
            _ => None,
        }
    }

    /// Whether the retry controller may try again
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(failure) => retry::RETRYABLE_STATUSES.contains(&failure.status),
            Self::Transport(_) | Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Whether the error aborts the whole run rather than one document
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Parse { .. } | Self::Validation(_) | Self::Json(_) | Self::Yaml(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
