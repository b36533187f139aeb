//! GroundWiki - Evidence-Grounded Documentation Generator
//!
//! Generates and maintains a Markdown documentation tree for a source
//! repository from structured LLM output. Every record the model returns
//! must cite strings found verbatim in the context it was given; ungrounded
//! records are dropped before anything is written.
//!
//! ## Core Features
//!
//! - **Structured Output Negotiation**: JSON schema, then JSON mode, then
//!   prompt-only, degrading per endpoint rejection
//! - **Tolerant Extraction**: fenced, raw, repaired and balanced-scan JSON
//! - **Evidence Grounding**: verbatim checks with optional fallback tokens
//! - **Path Safety**: model-chosen categories never leave the docs root
//! - **Retry Control**: bounded retries on 403/429 and transport failures
//!
//! ## Quick Start
//!
//! ```ignore
//! use groundwiki::{BootstrapPipeline, ConfigLoader, create_provider};
//!
//! let config = ConfigLoader::load(None)?;
//! let provider = create_provider(&config.llm)?;
//! let summary = BootstrapPipeline::new(config, provider, "path/to/repo")
//!     .run()
//!     .await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: Transport, retry, negotiation, extraction, validation, chunking
//! - [`analyzer`]: Repository scanning, context building, diff filtering
//! - [`config`]: Layered configuration
//! - [`wiki`]: Generation stages, pipelines and the doc writer

pub mod ai;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod constants;
pub mod types;
pub mod wiki;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, GroundError, Result};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use wiki::{BootstrapPipeline, DocWriter, RunSummary, StageRunner, UpdatePipeline};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    ContextChunker, EvidencePolicy, GenerationClient, GenerationRequest, KeyCoercer, LlmProvider,
    SharedProvider, TimeoutConfig, ValidationPipeline, create_provider, extract_value,
    with_timeout,
};

// =============================================================================
// Analyzer Re-exports
// =============================================================================

pub use analyzer::{FileScanner, RepoContextBuilder};
