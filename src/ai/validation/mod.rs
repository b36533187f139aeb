//! Model Output Validation
//!
//! Turns raw model text into records that can be trusted downstream:
//! - Tolerant extraction of one JSON value from noisy text
//! - Key coercion onto a fixed schema
//! - Evidence grounding against the source context
//! - Path safety and markdown content checks
//!
//! ## Design Philosophy
//! - Repair format issues, reject ungrounded content
//! - A failed record is dropped by its stage, never the whole run

mod coerce;
mod document;
mod evidence;
mod extractor;
mod paths;

pub use coerce::{KeyCoercer, canonical_key};
pub use document::{
    DocKind, DocStatus, DocType, Frontmatter, check_document, parse_frontmatter,
    quote_yaml_string, sanitize_frontmatter, split_frontmatter,
};
pub use evidence::{EvidencePolicy, evidence_items, normalize_evidence};
pub use extractor::{Strategy, ValueExtractor, extract_value, sanitize_json_like};
pub use paths::{
    check_category, check_file_name, is_safe_category, is_safe_file_name, normalize_category,
};

use serde_json::{Map, Value};

use crate::types::{GroundError, Result, ValidationErrorKind};

/// Extraction followed by key coercion
pub struct ValidationPipeline {
    extractor: ValueExtractor,
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self {
            extractor: ValueExtractor::new(),
        }
    }

    /// Extract one object and coerce it.
    ///
    /// A top-level array is accepted when it holds an object; the first
    /// object wins.
    pub fn object(
        &self,
        raw: &str,
        coercer: &KeyCoercer,
        defaults: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let value = self.extractor.extract(raw)?;
        let obj = match value {
            Value::Object(obj) => obj,
            Value::Array(items) => items
                .into_iter()
                .find_map(|item| match item {
                    Value::Object(obj) => Some(obj),
                    _ => None,
                })
                .ok_or_else(|| {
                    GroundError::validation(
                        ValidationErrorKind::Schema,
                        "expected a JSON object, got an array without objects",
                    )
                })?,
            _ => {
                return Err(GroundError::validation(
                    ValidationErrorKind::Schema,
                    "expected a JSON object",
                ));
            }
        };
        Ok(coercer.coerce(&obj, defaults))
    }

    /// Extract a list of objects and coerce each. A lone object counts as a
    /// one-element list; non-object items are skipped.
    pub fn objects(
        &self,
        raw: &str,
        coercer: &KeyCoercer,
        defaults: &Map<String, Value>,
    ) -> Result<Vec<Map<String, Value>>> {
        let items = match self.extractor.extract(raw)? {
            Value::Array(items) => items,
            other => vec![other],
        };
        Ok(items
            .iter()
            .filter_map(Value::as_object)
            .map(|obj| coercer.coerce(obj, defaults))
            .collect())
    }
}
