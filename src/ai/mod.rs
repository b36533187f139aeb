//! AI Integration Layer
//!
//! Everything between a prompt and a trusted record: provider transport and
//! retry, structured-output negotiation, prompt templates, record schemas,
//! context chunking and model-output validation.

pub mod chunker;
pub mod prompt;
pub mod provider;
pub mod schemas;
pub mod timeout;
pub mod validation;

pub use chunker::{ChunkBudget, ChunkHeader, ContextChunker, DiskSource, FileChunk, FileSource};
pub use prompt::{PromptBuilder, PromptSection, PromptTemplates};
pub use provider::{
    ErrorCategory, ErrorClassifier, GenerationClient, GenerationRequest, HttpFailure,
    LlmProvider, NegotiationState, PingReport, ProviderStyle, RetryPolicy, SchemaDescriptor,
    SharedProvider, Sleeper, TokioSleeper, create_provider, detect_style, report_error,
};
pub use timeout::{TimeoutConfig, with_timeout};
pub use validation::{EvidencePolicy, KeyCoercer, ValidationPipeline, extract_value};
