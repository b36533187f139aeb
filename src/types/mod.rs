pub mod error;
pub mod records;
pub mod utils;

pub use error::{
    ErrorCategory, ErrorClassifier, GroundError, HttpFailure, Result, ValidationError,
    ValidationErrorKind,
};
pub use records::*;
pub use utils::{
    json_objects, json_string, json_string_list, json_string_or, json_usize, mask_secret,
    today, truncate_chars,
};
