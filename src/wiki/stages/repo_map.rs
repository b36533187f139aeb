//! Stage 1: repository map.

use serde_json::Value;
use tracing::{info, instrument};

use super::{StageRunner, isolate};
use crate::ai::prompt::{JSON_ONLY_SYSTEM, PromptTemplates};
use crate::ai::schemas::{self, REPO_MAP_KEYS};
use crate::ai::validation::{EvidencePolicy, KeyCoercer};
use crate::config::Stage;
use crate::types::{
    RepoMap, Result, json_objects, json_string_list, json_string_or,
};

const FALLBACK_LIMITATIONS: &str =
    "RepoMap generation failed; downstream steps will have reduced quality.";

/// Parse and validate one repository-map response against `repo_context`.
pub fn parse_repo_map(runner: &StageRunner, raw: &str, repo_context: &str) -> Result<RepoMap> {
    let coercer = KeyCoercer::new(REPO_MAP_KEYS.iter().copied());
    let defaults = StageRunner::defaults(&[
        ("repo", Value::from(runner.repo.as_str())),
        ("branch", Value::from(runner.branch.as_str())),
        ("generated_at", Value::from(runner.today.as_str())),
    ]);
    let value = Value::Object(runner.validator().object(raw, &coercer, &defaults)?);

    let evidence = EvidencePolicy::repo_map().validate(
        &json_string_list(&value, "evidence"),
        repo_context,
        &[],
    )?;

    Ok(RepoMap {
        repo: json_string_or(&value, "repo", &runner.repo),
        branch: json_string_or(&value, "branch", &runner.branch),
        generated_at: json_string_or(&value, "generated_at", &runner.today),
        summary: json_string_or(&value, "summary", ""),
        module_groups: json_objects(&value, "module_groups"),
        public_surfaces: json_objects(&value, "public_surfaces"),
        doc_group_suggestions: json_objects(&value, "doc_group_suggestions"),
        limitations: json_string_or(&value, "limitations", ""),
        evidence,
    })
}

/// Generate the repository map.
///
/// Parse and validation failures yield a minimal map whose `limitations`
/// explains the failure; endpoint failures propagate.
#[instrument(skip_all, fields(repo = %runner.repo))]
pub async fn generate_repo_map(runner: &StageRunner, repo_context: &str) -> Result<RepoMap> {
    let request = runner
        .request(
            Stage::RepoMap,
            PromptTemplates::repo_map(repo_context),
            JSON_ONLY_SYSTEM,
        )
        .with_schema(schemas::repo_map());

    let result = match runner.send(&request).await {
        Ok(raw) => parse_repo_map(runner, &raw, repo_context),
        Err(err) => Err(err),
    };

    match isolate("RepoMap generation", result)? {
        Some(map) => {
            info!(
                module_groups = map.module_groups.len(),
                public_surfaces = map.public_surfaces.len(),
                evidence = map.evidence.len(),
                "RepoMap generated"
            );
            Ok(map)
        }
        None => Ok(RepoMap::minimal(
            &runner.repo,
            &runner.branch,
            &runner.today,
            FALLBACK_LIMITATIONS,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroundError;
    use crate::wiki::stages::testing::*;
    use serde_json::json;

    const CONTEXT: &str = "Repo: org/repo\n- src/core.py\n- src/api/users.py\n- src/db.py\nclass Engine:\ndef main():";

    fn response(evidence: &[&str]) -> String {
        json!({
            "Repo": "org/repo",
            "summary": "Core engine with an API layer",
            "module_groups": [{"name": "core", "path_prefixes": ["src/"], "responsibility": "engine"}],
            "public_surfaces": [{"name": "Engine", "kind": "class", "location": "src/core.py", "notes": ""}, "junk"],
            "doc_group_suggestions": [],
            "limitations": "",
            "evidence": evidence,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_repo_map_accepts_grounded_response() {
        let provider = ScriptedProvider::fixed(&response(&[
            "src/core.py",
            "src/db.py",
            "class Engine:",
            "made-up.py",
            "other.py",
        ]));
        let runner = runner(provider.clone());

        let map = generate_repo_map(&runner, CONTEXT).await.unwrap();
        assert_eq!(map.repo, "org/repo");
        assert_eq!(map.branch, "main");
        assert_eq!(map.generated_at, "2025-01-01");
        assert_eq!(map.public_surfaces.len(), 1);
        assert_eq!(
            map.evidence,
            vec!["class Engine:", "made-up.py", "other.py", "src/core.py", "src/db.py"]
        );

        let sent = provider.requests();
        assert_eq!(schema_name(&sent[0]), "repo_map");
        assert!(sent[0].prompt.contains(CONTEXT));
    }

    #[tokio::test]
    async fn test_repo_map_falls_back_on_weak_evidence() {
        let provider = ScriptedProvider::fixed(&response(&["src/core.py", "src/db.py"]));
        let map = generate_repo_map(&runner(provider), CONTEXT).await.unwrap();

        assert_eq!(map.limitations, FALLBACK_LIMITATIONS);
        assert!(map.module_groups.is_empty());
        assert_eq!(map.repo, "org/repo");
    }

    #[tokio::test]
    async fn test_repo_map_counts_duplicate_citations() {
        let provider = ScriptedProvider::fixed(&response(&[
            "src/core.py",
            "`src/core.py`",
            "src/db.py",
            "class Engine:",
            "def main():",
        ]));
        let map = generate_repo_map(&runner(provider), CONTEXT).await.unwrap();

        assert_eq!(map.limitations, "");
        assert_eq!(
            map.evidence,
            vec!["class Engine:", "def main():", "src/core.py", "src/db.py"]
        );
    }

    #[tokio::test]
    async fn test_repo_map_falls_back_on_unparseable_output() {
        let provider = ScriptedProvider::fixed("I cannot help with that.");
        let map = generate_repo_map(&runner(provider), CONTEXT).await.unwrap();
        assert_eq!(map.limitations, FALLBACK_LIMITATIONS);
    }

    #[tokio::test]
    async fn test_repo_map_propagates_endpoint_failure() {
        let provider = ScriptedProvider::new(|_| Err(GroundError::http(401, "invalid key")));
        let result = generate_repo_map(&runner(provider), CONTEXT).await;
        assert!(matches!(result, Err(GroundError::Http(_))));
    }
}
