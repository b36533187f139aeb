//! Record Schemas
//!
//! JSON schemas sent as structured-output constraints (or embedded in the
//! prompt), and the fixed key lists the coercer maps responses onto. Every
//! object forbids additional properties and requires all of its keys.

use serde_json::{Map, Value, json};

use crate::ai::provider::SchemaDescriptor;

pub const REPO_MAP_KEYS: &[&str] = &[
    "repo",
    "branch",
    "generated_at",
    "summary",
    "module_groups",
    "public_surfaces",
    "doc_group_suggestions",
    "limitations",
    "evidence",
];

pub const DIR_ANALYSIS_KEYS: &[&str] = &[
    "dir",
    "chunk_index",
    "chunk_total",
    "files",
    "summary",
    "public_contracts",
    "key_components",
    "configs",
    "dependencies",
    "risks",
    "limitations",
    "evidence",
];

pub const DOC_PLAN_KEYS: &[&str] = &[
    "target_category",
    "file_name",
    "title",
    "source_dirs",
    "reason",
    "evidence",
];

pub const DOC_PAGE_KEYS: &[&str] = &["target_category", "file_name", "content", "evidence", "reason"];

pub const CHANGE_KEYS: &[&str] = &[
    "action",
    "target_category",
    "file_name",
    "content",
    "evidence",
    "reason",
];

fn string() -> Value {
    json!({"type": "string"})
}

fn number() -> Value {
    json!({"type": "number"})
}

fn string_list() -> Value {
    json!({"type": "array", "items": {"type": "string"}})
}

fn list_of(item: Value) -> Value {
    json!({"type": "array", "items": item})
}

/// Closed object schema; every property is required, in declaration order
fn object(props: Vec<(&str, Value)>) -> Value {
    let required: Vec<Value> = props.iter().map(|(k, _)| Value::from(*k)).collect();
    let properties: Map<String, Value> = props
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": properties,
        "required": required,
    })
}

fn string_object(keys: &[&str]) -> Value {
    object(keys.iter().map(|k| (*k, string())).collect())
}

fn page_item() -> Value {
    object(vec![
        ("target_category", string()),
        ("file_name", string()),
        ("content", string()),
        ("evidence", string_list()),
        ("reason", string()),
    ])
}

pub fn repo_map() -> SchemaDescriptor {
    let schema = object(vec![
        ("repo", string()),
        ("branch", string()),
        ("generated_at", string()),
        ("summary", string()),
        (
            "module_groups",
            list_of(object(vec![
                ("name", string()),
                ("path_prefixes", string_list()),
                ("responsibility", string()),
            ])),
        ),
        (
            "public_surfaces",
            list_of(string_object(&["name", "kind", "location", "notes"])),
        ),
        (
            "doc_group_suggestions",
            list_of(object(vec![
                ("group_path", string()),
                ("rationale", string()),
                ("related_paths", string_list()),
            ])),
        ),
        ("limitations", string()),
        ("evidence", string_list()),
    ]);
    SchemaDescriptor::new("repo_map", schema)
}

pub fn dir_analysis() -> SchemaDescriptor {
    let schema = object(vec![
        ("dir", string()),
        ("chunk_index", number()),
        ("chunk_total", number()),
        ("files", string_list()),
        ("summary", string()),
        (
            "public_contracts",
            list_of(string_object(&[
                "name",
                "kind",
                "defined_in",
                "signature",
                "notes",
            ])),
        ),
        (
            "key_components",
            list_of(string_object(&["name", "defined_in", "responsibility"])),
        ),
        (
            "configs",
            list_of(string_object(&["name", "defined_in", "type", "notes"])),
        ),
        ("dependencies", string_list()),
        ("risks", string_list()),
        ("limitations", string()),
        ("evidence", string_list()),
    ]);
    SchemaDescriptor::new("dir_analysis", schema)
}

/// Array of plan items
pub fn doc_plan() -> SchemaDescriptor {
    let item = object(vec![
        ("target_category", string()),
        ("file_name", string()),
        ("title", string()),
        ("source_dirs", string_list()),
        ("reason", string()),
        ("evidence", string_list()),
    ]);
    SchemaDescriptor::new("doc_plan", list_of(item))
}

/// One page; `name` distinguishes plan pages from API pages in logs
pub fn doc_page(name: &str) -> SchemaDescriptor {
    SchemaDescriptor::new(name, page_item())
}

pub fn doc_update() -> SchemaDescriptor {
    let schema = object(vec![
        ("action", string()),
        ("target_category", string()),
        ("file_name", string()),
        ("content", string()),
        ("evidence", string_list()),
        ("reason", string()),
    ]);
    SchemaDescriptor::new("doc_update", schema)
}

/// Array of single-pass bootstrap docs
pub fn bootstrap_docs() -> SchemaDescriptor {
    SchemaDescriptor::new("bootstrap_docs", list_of(page_item()))
}
