//! Stages 5 to 7: page generation.
//!
//! - Plan pages, one per plan item, from the analyses of its source dirs
//! - Single-pass bootstrap docs when no plan could be produced
//! - API pages, one per source module

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::doc_plan::source_dir_fallback;
use super::{StageRunner, isolate, to_prompt_json};
use crate::ai::prompt::{JSON_ONLY_SYSTEM, PromptTemplates};
use crate::ai::schemas::{self, DOC_PAGE_KEYS};
use crate::ai::validation::{
    DocKind, EvidencePolicy, KeyCoercer, check_category, check_document, check_file_name,
    normalize_category,
};
use crate::analyzer::top_level_signatures;
use crate::config::Stage;
use crate::constants::pipeline::SINGLE_PASS_MAX_DOCS;
use crate::types::{
    DirAnalysis, DocPage, DocPlanItem, GroundError, RepoMap, Result, ValidationErrorKind,
    json_string_list, json_string_or,
};

/// Grounding rules for one page
struct PageCheck<'a> {
    kind: DocKind,
    allow_index: bool,
    policy: EvidencePolicy,
    haystack: &'a str,
    fallback: &'a [String],
}

impl PageCheck<'_> {
    fn apply(&self, map: Map<String, Value>) -> Result<DocPage> {
        let value = Value::Object(map);
        let target_category = check_category(&json_string_or(&value, "target_category", ""))?;
        let file_name = check_file_name(&json_string_or(&value, "file_name", ""), self.allow_index)?;

        let content = value
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        check_document(&content, self.kind)?;

        let evidence = self.policy.validate(
            &json_string_list(&value, "evidence"),
            self.haystack,
            self.fallback,
        )?;

        Ok(DocPage {
            target_category,
            file_name,
            content,
            evidence,
            reason: json_string_or(&value, "reason", ""),
        })
    }
}

fn page_defaults(category: &str, file_name: &str) -> Map<String, Value> {
    StageRunner::defaults(&[
        ("target_category", Value::from(category)),
        ("file_name", Value::from(file_name)),
        ("content", Value::from("")),
        ("evidence", Value::Array(Vec::new())),
        ("reason", Value::from("")),
    ])
}

fn page_coercer() -> KeyCoercer {
    KeyCoercer::new(DOC_PAGE_KEYS.iter().copied())
}

// =============================================================================
// Plan pages
// =============================================================================

/// Generate the page for one plan item. `None` when the page was dropped.
#[instrument(skip_all, fields(page = %format!("{}/{}", item.target_category, item.file_name)))]
pub async fn generate_doc_page(
    runner: &StageRunner,
    item: &DocPlanItem,
    repo_map: &RepoMap,
    analyses: &BTreeMap<String, Vec<DirAnalysis>>,
) -> Result<Option<DocPage>> {
    let selected: Vec<&DirAnalysis> = item
        .source_dirs
        .iter()
        .filter_map(|dir| analyses.get(dir))
        .flatten()
        .collect();

    let repo_map_json = to_prompt_json(repo_map)?;
    let selected_json = to_prompt_json(&selected)?;
    let haystack = format!("{}\n{}", repo_map_json, selected_json);

    let request = runner
        .request(
            Stage::DocPage,
            PromptTemplates::doc_page(
                &runner.today,
                &to_prompt_json(item)?,
                &repo_map_json,
                &selected_json,
            ),
            JSON_ONLY_SYSTEM,
        )
        .with_schema(schemas::doc_page("doc_page"));

    let fallback = source_dir_fallback(&item.source_dirs, &repo_map.repo);
    let check = PageCheck {
        kind: DocKind::PlanPage,
        allow_index: true,
        policy: EvidencePolicy::record(runner.allow_fallback),
        haystack: &haystack,
        fallback: &fallback,
    };

    let result = async {
        let raw = runner.send(&request).await?;
        let defaults = page_defaults(&item.target_category, &item.file_name);
        let map = runner.validator().object(&raw, &page_coercer(), &defaults)?;
        check.apply(map)
    }
    .await;

    let context = format!("Doc page ({}/{})", item.target_category, item.file_name);
    isolate(&context, result)
}

// =============================================================================
// Single-pass bootstrap
// =============================================================================

/// Parse a single-pass response; invalid docs are dropped one by one.
pub fn parse_bootstrap_docs(runner: &StageRunner, raw: &str, repo_context: &str) -> Result<Vec<DocPage>> {
    let items = runner
        .validator()
        .objects(raw, &page_coercer(), &Map::new())?;

    let check = PageCheck {
        kind: DocKind::Bootstrap,
        allow_index: false,
        policy: EvidencePolicy::strict_record(),
        haystack: repo_context,
        fallback: &[],
    };

    let mut docs = Vec::new();
    for map in items.into_iter().take(SINGLE_PASS_MAX_DOCS) {
        match check.apply(map) {
            Ok(doc) => docs.push(doc),
            Err(err) => info!(error = %err, "Bootstrap doc rejected"),
        }
    }
    Ok(docs)
}

/// One call producing a small documentation baseline from the repo context
#[instrument(skip_all)]
pub async fn generate_bootstrap_docs(
    runner: &StageRunner,
    repo_context: &str,
    existing_docs: &str,
    categories: &[String],
) -> Result<Vec<DocPage>> {
    let request = runner
        .request(
            Stage::BootstrapDocs,
            PromptTemplates::bootstrap_docs(
                &runner.repo,
                &runner.branch,
                &runner.today,
                categories,
                repo_context,
                existing_docs,
            ),
            JSON_ONLY_SYSTEM,
        )
        .with_schema(schemas::bootstrap_docs());

    let result = match runner.send(&request).await {
        Ok(raw) => parse_bootstrap_docs(runner, &raw, repo_context),
        Err(err) => Err(err),
    };

    let docs = isolate("Bootstrap generation", result)?.unwrap_or_default();
    info!(docs = docs.len(), "Single-pass bootstrap finished");
    Ok(docs)
}

// =============================================================================
// API pages
// =============================================================================

/// Code fence language for a module path
fn fence_language(module_path: &str) -> &'static str {
    match module_path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("py") => "python",
        Some("rs") => "rust",
        Some("go") => "go",
        Some("ts") | Some("tsx") => "typescript",
        Some("js") => "javascript",
        _ => "text",
    }
}

/// Generate the API page of one source module.
///
/// The output path is fixed by the caller; a response naming another
/// category or file is rejected.
#[instrument(skip_all, fields(module = module_path))]
pub async fn generate_api_page(
    runner: &StageRunner,
    repo_map: &RepoMap,
    module_path: &str,
    module_text: &str,
    target_category: &str,
    file_name: &str,
) -> Result<Option<DocPage>> {
    let target_category = normalize_category(target_category);
    let request = runner
        .request(
            Stage::ApiPage,
            PromptTemplates::api_page(
                &runner.today,
                module_path,
                module_text,
                fence_language(module_path),
                &target_category,
                file_name,
                &to_prompt_json(repo_map)?,
            ),
            JSON_ONLY_SYSTEM,
        )
        .with_schema(schemas::doc_page("api_page"));

    let haystack = format!("{}\n{}", module_path, module_text);
    let mut fallback = vec![module_path.to_string()];
    fallback.extend(top_level_signatures(module_path, module_text, 1));
    let check = PageCheck {
        kind: DocKind::ApiPage,
        allow_index: false,
        policy: EvidencePolicy::record(runner.allow_fallback),
        haystack: &haystack,
        fallback: &fallback,
    };

    let result = async {
        let raw = runner.send(&request).await?;
        let defaults = page_defaults(&target_category, file_name);
        let map = runner.validator().object(&raw, &page_coercer(), &defaults)?;
        let page = check.apply(map)?;
        if page.target_category != target_category || page.file_name != file_name {
            return Err(GroundError::validation(
                ValidationErrorKind::PathSafety,
                format!(
                    "api page must be written to {}/{} (got {}/{})",
                    target_category, file_name, page.target_category, page.file_name
                ),
            ));
        }
        Ok(page)
    }
    .await;

    debug!(ok = result.is_ok(), "API page generated");
    isolate(&format!("API page ({})", module_path), result)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::wiki::stages::testing::*;
    use serde_json::json;

    /// Markdown page carrying every section of `kind`
    pub(crate) fn page_content(title: &str, kind: DocKind) -> String {
        let mut content = format!(
            "---\ntitle: {}\ntype: feature\nstatus: stable\nlast_updated: 2025-01-01\n---\n\n# {}\n",
            title, title
        );
        for section in kind.required_sections() {
            content.push_str(&format!("\n{}\n\nText.\n", section));
        }
        content
    }

    fn page_json(category: &str, file: &str, kind: DocKind, evidence: &[&str]) -> Value {
        json!({
            "target_category": category,
            "file_name": file,
            "content": page_content("Engine", kind),
            "evidence": evidence,
            "reason": "core",
        })
    }

    fn plan_item() -> DocPlanItem {
        DocPlanItem {
            target_category: "core".into(),
            file_name: "engine.md".into(),
            title: "Engine".into(),
            source_dirs: vec!["src/core".into()],
            reason: "r".into(),
            evidence: vec![],
        }
    }

    fn analyses() -> BTreeMap<String, Vec<DirAnalysis>> {
        let mut map = BTreeMap::new();
        map.insert(
            "src/core".to_string(),
            vec![DirAnalysis {
                dir: "src/core".into(),
                summary: "Engine loop".into(),
                files: vec!["src/core/engine.py".into()],
                ..Default::default()
            }],
        );
        map.insert(
            "src/other".to_string(),
            vec![DirAnalysis {
                dir: "src/other".into(),
                summary: "SECRET_OTHER".into(),
                ..Default::default()
            }],
        );
        map
    }

    #[tokio::test]
    async fn test_doc_page_uses_selected_analyses() {
        let response = page_json("core", "engine.md", DocKind::PlanPage, &["src/core/engine.py", "Engine loop"]);
        let provider = ScriptedProvider::fixed(&response.to_string());
        let runner = runner(provider.clone());
        let map = RepoMap {
            repo: "org/repo".into(),
            ..Default::default()
        };

        let page = generate_doc_page(&runner, &plan_item(), &map, &analyses())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.file_name, "engine.md");
        assert_eq!(page.evidence, vec!["Engine loop", "src/core/engine.py"]);

        let sent = provider.requests();
        assert!(sent[0].prompt.contains("Engine loop"));
        assert!(!sent[0].prompt.contains("SECRET_OTHER"));
    }

    #[tokio::test]
    async fn test_doc_page_defaults_path_from_plan() {
        let response = json!({
            "content": page_content("Engine", DocKind::PlanPage),
            "evidence": ["nothing", "matches"],
        });
        let runner = runner(ScriptedProvider::fixed(&response.to_string()));
        let map = RepoMap {
            repo: "org/repo".into(),
            ..Default::default()
        };

        let page = generate_doc_page(&runner, &plan_item(), &map, &analyses())
            .await
            .unwrap()
            .unwrap();
        assert_eq!((page.target_category.as_str(), page.file_name.as_str()), ("core", "engine.md"));
        assert_eq!(page.evidence, vec!["src/core", "org/repo"]);
    }

    #[tokio::test]
    async fn test_doc_page_missing_section_is_dropped() {
        let response = page_json("core", "engine.md", DocKind::Bootstrap, &["src/core/engine.py", "Engine loop"]);
        let runner = runner(ScriptedProvider::fixed(&response.to_string()));

        let page = generate_doc_page(&runner, &plan_item(), &RepoMap::default(), &analyses())
            .await
            .unwrap();
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_docs_validation() {
        let context = "Repo: org/repo\n- src/core.py\n- src/api.py";
        let response = json!([
            page_json("core", "core.md", DocKind::Bootstrap, &["src/core.py", "src/api.py"]),
            page_json("core", "index.md", DocKind::Bootstrap, &["src/core.py", "src/api.py"]),
            page_json("core", "weak.md", DocKind::Bootstrap, &["src/core.py", "invented.py"]),
            page_json("snapshots", "s.md", DocKind::Bootstrap, &["src/core.py", "src/api.py"]),
        ]);
        let runner = runner(ScriptedProvider::fixed(&response.to_string()));

        let docs = generate_bootstrap_docs(&runner, context, "", &[]).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_name, "core.md");
    }

    #[tokio::test]
    async fn test_api_page_path_must_match() {
        let text = "def get_user(uid):\n    pass\n";
        let good = page_json("api", "users.md", DocKind::ApiPage, &["get_user", "src/api/users.py"]);
        let runner_ok = runner(ScriptedProvider::fixed(&good.to_string()));
        let page = generate_api_page(&runner_ok, &RepoMap::default(), "src/api/users.py", text, "/api/", "users.md")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.target_category, "api");

        let moved = page_json("elsewhere", "users.md", DocKind::ApiPage, &["get_user", "src/api/users.py"]);
        let runner_bad = runner(ScriptedProvider::fixed(&moved.to_string()));
        let page = generate_api_page(&runner_bad, &RepoMap::default(), "src/api/users.py", text, "api", "users.md")
            .await
            .unwrap();
        assert!(page.is_none());
    }

    #[tokio::test]
    async fn test_api_page_fallback_evidence() {
        let text = "import os\ndef get_user(uid):\n    pass\n";
        let response = page_json("api", "users.md", DocKind::ApiPage, &["made_up"]);
        let provider = ScriptedProvider::fixed(&response.to_string());
        let runner = runner(provider.clone());

        let page = generate_api_page(&runner, &RepoMap::default(), "src/api/users.py", text, "api", "users.md")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.evidence, vec!["src/api/users.py", "def get_user(uid):"]);
        assert!(provider.requests()[0].prompt.contains("```python\nimport os"));
    }

    #[test]
    fn test_fence_language() {
        assert_eq!(fence_language("a/b.py"), "python");
        assert_eq!(fence_language("lib.rs"), "rust");
        assert_eq!(fence_language("Makefile"), "text");
    }
}
