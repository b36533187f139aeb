//! Evidence-Grounded Documentation Generation
//!
//! Every generated record must cite strings that occur verbatim in the
//! source context it was generated from; records that cannot are dropped
//! before anything is written.
//!
//! ## Pipelines
//!
//! ```text
//! Bootstrap: RepoMap → Directory Analyses → Briefs → Plan → Pages (+ API pages)
//! Update:    Relevance Gate → Diff Preprocessing → Change Record → Apply
//! ```

pub mod pipeline;
pub mod stages;
pub mod writer;

pub use pipeline::{BootstrapPipeline, RunSummary, UpdatePipeline};
pub use stages::StageRunner;
pub use writer::{DocContextLimits, DocWriter, extract_title};
