//! Stage 4: documentation plan.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::{StageRunner, isolate, to_prompt_json};
use crate::ai::prompt::{JSON_ONLY_SYSTEM, PromptTemplates};
use crate::ai::schemas::{self, DOC_PLAN_KEYS};
use crate::ai::validation::{EvidencePolicy, KeyCoercer, check_category, check_file_name};
use crate::config::Stage;
use crate::types::{
    DirBrief, DocPlanItem, GroundError, RepoMap, Result, ValidationErrorKind, json_string_list,
    json_string_or,
};

/// Guaranteed-present evidence for a record built from `source_dirs`
pub(crate) fn source_dir_fallback(source_dirs: &[String], repo: &str) -> Vec<String> {
    let mut fallback = Vec::new();
    if let Some(first) = source_dirs.first() {
        fallback.push(first.clone());
    }
    if let Some(last) = source_dirs.last()
        && Some(last) != source_dirs.first()
    {
        fallback.push(last.clone());
    }
    if !repo.trim().is_empty() {
        fallback.push(repo.trim().to_string());
    }
    fallback
}

/// Validate one coerced plan item
fn plan_item(
    runner: &StageRunner,
    map: &Map<String, Value>,
    known_dirs: &BTreeSet<&str>,
    haystack: &str,
    repo: &str,
) -> Result<DocPlanItem> {
    let value = Value::Object(map.clone());
    let target_category = check_category(&json_string_or(&value, "target_category", ""))?;
    let file_name = check_file_name(&json_string_or(&value, "file_name", ""), true)?;

    let source_dirs: Vec<String> = json_string_list(&value, "source_dirs")
        .into_iter()
        .map(|d| d.trim().to_string())
        .collect();
    if source_dirs.is_empty() || source_dirs.iter().any(|d| d.is_empty()) {
        return Err(GroundError::validation(
            ValidationErrorKind::MissingField,
            "source_dirs must be a non-empty list of directories",
        ));
    }
    if let Some(unknown) = source_dirs.iter().find(|d| !known_dirs.contains(d.as_str())) {
        return Err(GroundError::validation(
            ValidationErrorKind::Schema,
            format!("source_dirs names an unanalyzed directory: {}", unknown),
        ));
    }

    let evidence = EvidencePolicy::record(runner.allow_fallback).validate(
        &json_string_list(&value, "evidence"),
        haystack,
        &source_dir_fallback(&source_dirs, repo),
    )?;

    Ok(DocPlanItem {
        title: json_string_or(&value, "title", &file_name),
        target_category,
        file_name,
        source_dirs,
        reason: json_string_or(&value, "reason", ""),
        evidence,
    })
}

/// Parse a plan response; invalid items are dropped one by one.
pub fn parse_doc_plan(
    runner: &StageRunner,
    raw: &str,
    repo_map: &RepoMap,
    briefs: &[DirBrief],
    haystack: &str,
    max_pages: usize,
) -> Result<Vec<DocPlanItem>> {
    let coercer = KeyCoercer::new(DOC_PLAN_KEYS.iter().copied());
    let items = runner.validator().objects(raw, &coercer, &Map::new())?;
    let known_dirs: BTreeSet<&str> = briefs.iter().map(|b| b.dir.as_str()).collect();

    let mut plan = Vec::new();
    for map in &items {
        match plan_item(runner, map, &known_dirs, haystack, &repo_map.repo) {
            Ok(item) => plan.push(item),
            Err(err) => debug!(error = %err, "Dropping plan item"),
        }
        if plan.len() >= max_pages {
            break;
        }
    }
    Ok(plan)
}

/// Plan the documentation pages. A failed plan is empty.
#[instrument(skip_all, fields(briefs = briefs.len(), max_pages))]
pub async fn generate_doc_plan(
    runner: &StageRunner,
    repo_map: &RepoMap,
    briefs: &[DirBrief],
    max_pages: usize,
) -> Result<Vec<DocPlanItem>> {
    let repo_map_json = to_prompt_json(repo_map)?;
    let briefs_json = to_prompt_json(&briefs)?;
    let haystack = format!("{}\n{}", repo_map_json, briefs_json);

    let request = runner
        .request(
            Stage::DocPlan,
            PromptTemplates::doc_plan(
                &runner.repo,
                &runner.branch,
                max_pages,
                &repo_map_json,
                &briefs_json,
            ),
            JSON_ONLY_SYSTEM,
        )
        .with_schema(schemas::doc_plan());

    let result = match runner.send(&request).await {
        Ok(raw) => parse_doc_plan(runner, &raw, repo_map, briefs, &haystack, max_pages),
        Err(err) => Err(err),
    };

    let plan = isolate("Doc plan generation", result)?.unwrap_or_default();
    info!(pages = plan.len(), "Doc plan ready");
    Ok(plan)
}
