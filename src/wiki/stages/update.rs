//! Incremental update stages.
//!
//! A commit passes the path filter and the relevance gate, its diff is
//! compressed when large, then one change record is generated.

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use super::{StageRunner, isolate};
use crate::ai::prompt::{DIFF_SUMMARY_SYSTEM, PromptTemplates, RELEVANCE_SYSTEM, UPDATE_SYSTEM};
use crate::ai::schemas::{self, CHANGE_KEYS};
use crate::ai::validation::{
    DocKind, EvidencePolicy, KeyCoercer, check_category, check_document, check_file_name,
    normalize_category,
};
use crate::analyzer::{changed_paths, should_skip_by_paths};
use crate::config::Stage;
use crate::constants::pipeline::{
    DIFF_SUMMARY_INPUT_CHARS, DIFF_TRUNCATE_CHARS, LARGE_DIFF_LINES, RELEVANCE_DIFF_CHARS,
};
use crate::types::{
    ChangeAction, ChangeRecord, GroundError, Result, ValidationErrorKind, json_string_list,
    json_string_or, truncate_chars,
};

/// Decide whether a commit can affect the documentation.
///
/// `force` bypasses every check. Any model error counts as "no".
#[instrument(skip_all, fields(force))]
pub async fn should_update_docs(
    runner: &StageRunner,
    commit_message: &str,
    diff: &str,
    force: bool,
) -> bool {
    if force {
        return true;
    }

    let paths = changed_paths(diff);
    if should_skip_by_paths(&paths) {
        info!(paths = paths.len(), "Only ignored paths changed, skipping");
        return false;
    }

    let snippet = truncate_chars(diff, RELEVANCE_DIFF_CHARS);
    let request = runner
        .request(
            Stage::Relevance,
            PromptTemplates::relevance(commit_message, &snippet),
            RELEVANCE_SYSTEM,
        )
        .with_temperature(0.0);

    match runner.send(&request).await {
        Ok(answer) => {
            // The answer may carry a short reason around the verdict
            let relevant = answer.to_uppercase().contains("YES");
            debug!(answer = %answer.trim(), relevant, "Relevance gate");
            relevant
        }
        Err(err) => {
            warn!(error = %err, "Relevance check failed, skipping update");
            false
        }
    }
}

/// Compress a large diff into a model summary.
///
/// Small diffs pass through unchanged; a failed summary truncates instead.
#[instrument(skip_all, fields(lines = diff.matches('\n').count()))]
pub async fn preprocess_diff(runner: &StageRunner, diff: &str) -> String {
    let line_count = diff.matches('\n').count();
    if line_count < LARGE_DIFF_LINES {
        return diff.to_string();
    }

    let input = truncate_chars(diff, DIFF_SUMMARY_INPUT_CHARS);
    let request = runner.request(
        Stage::DiffSummary,
        PromptTemplates::diff_summary(&input),
        DIFF_SUMMARY_SYSTEM,
    );

    match runner.send(&request).await {
        Ok(summary) => {
            info!(chars = summary.chars().count(), "Large diff summarized");
            format!(
                "[Large Diff Summary]\n{}\n\n[Note: Original diff was {} lines and was summarized.]",
                summary.trim(),
                line_count
            )
        }
        Err(err) => {
            warn!(error = %err, "Diff summary failed, truncating");
            truncate_chars(diff, DIFF_TRUNCATE_CHARS)
        }
    }
}

/// Parse and validate a change record. `Ok(None)` for `noop`.
pub fn parse_change_record(
    runner: &StageRunner,
    raw: &str,
    commit_message: &str,
    processed_diff: &str,
) -> Result<Option<ChangeRecord>> {
    let coercer = KeyCoercer::new(CHANGE_KEYS.iter().copied());
    let defaults = StageRunner::defaults(&[
        ("target_category", Value::from("")),
        ("evidence", Value::Array(Vec::new())),
        ("reason", Value::from("")),
    ]);
    let map: Map<String, Value> = runner.validator().object(raw, &coercer, &defaults)?;
    let value = Value::Object(map);

    let action: ChangeAction = json_string_or(&value, "action", "")
        .parse()
        .map_err(|e: String| GroundError::validation(ValidationErrorKind::Schema, e))?;
    if action == ChangeAction::Noop {
        info!(reason = %json_string_or(&value, "reason", ""), "Model chose noop");
        return Ok(None);
    }

    let file_name = check_file_name(
        &json_string_or(&value, "file_name", ""),
        action != ChangeAction::Create,
    )?;
    let raw_category = json_string_or(&value, "target_category", "");
    let target_category = match action {
        ChangeAction::Create => check_category(&raw_category)?,
        _ => normalize_category(&raw_category),
    };

    let content = value
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    check_document(&content, DocKind::Change)?;

    let haystack = format!("{}\n{}", commit_message, processed_diff);
    let evidence = EvidencePolicy::strict_record().validate(
        &json_string_list(&value, "evidence"),
        &haystack,
        &[],
    )?;

    Ok(Some(ChangeRecord {
        action,
        target_category,
        file_name,
        content,
        evidence,
        reason: json_string_or(&value, "reason", ""),
    }))
}

/// Generate the change record of one commit.
///
/// `None` for `noop` and for records that fail validation.
#[instrument(skip_all)]
pub async fn generate_change_record(
    runner: &StageRunner,
    commit_message: &str,
    processed_diff: &str,
    existing_docs: &str,
    categories: &[String],
) -> Result<Option<ChangeRecord>> {
    let request = runner
        .request(
            Stage::Update,
            PromptTemplates::doc_update(
                &runner.repo,
                &runner.branch,
                &runner.today,
                categories,
                existing_docs,
                processed_diff,
                commit_message,
            ),
            UPDATE_SYSTEM,
        )
        .with_schema(schemas::doc_update());

    let result = match runner.send(&request).await {
        Ok(raw) => parse_change_record(runner, &raw, commit_message, processed_diff),
        Err(err) => Err(err),
    };

    Ok(isolate("Change record generation", result)?.flatten())
}
