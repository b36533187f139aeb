//! Stage 2: per-directory chunk analysis.

use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{StageRunner, isolate};
use crate::ai::chunker::{ChunkBudget, ChunkHeader, ContextChunker, FileChunk, FileSource};
use crate::ai::prompt::{JSON_ONLY_SYSTEM, PromptTemplates};
use crate::ai::schemas::{self, DIR_ANALYSIS_KEYS};
use crate::ai::validation::{EvidencePolicy, KeyCoercer};
use crate::config::Stage;
use crate::constants::evidence::{DIR_ANALYSIS_MAX_ITEMS, DIR_FALLBACK_FILES};
use crate::types::{DirAnalysis, Result, json_objects, json_string_list, json_string_or};

/// Parse and validate one chunk analysis.
///
/// Control fields come from the chunk, never from the model. Evidence is
/// checked against the rendered chunk; the fallback cites header paths and
/// the `Directory:` line.
pub fn parse_dir_analysis(
    runner: &StageRunner,
    raw: &str,
    chunk: &FileChunk,
    files_block: &str,
) -> Result<DirAnalysis> {
    let coercer = KeyCoercer::new(DIR_ANALYSIS_KEYS.iter().copied());
    let mut map = runner.validator().object(raw, &coercer, &Default::default())?;
    map.insert("dir".into(), Value::from(chunk.dir.as_str()));
    map.insert("chunk_index".into(), Value::from(chunk.index));
    map.insert("chunk_total".into(), Value::from(chunk.total));
    let value = Value::Object(map);

    let header_files = ChunkHeader::parse(files_block).files;
    let mut files = json_string_list(&value, "files");
    if files.is_empty() {
        files = header_files.clone();
    }

    let mut fallback: Vec<String> = header_files
        .iter()
        .take(DIR_FALLBACK_FILES)
        .cloned()
        .collect();
    fallback.push(format!("Directory: {}", chunk.dir));

    let evidence = EvidencePolicy::record(runner.allow_fallback)
        .with_max_kept(DIR_ANALYSIS_MAX_ITEMS)
        .validate(&json_string_list(&value, "evidence"), files_block, &fallback)?;

    Ok(DirAnalysis {
        dir: chunk.dir.clone(),
        chunk_index: chunk.index,
        chunk_total: chunk.total,
        files,
        summary: json_string_or(&value, "summary", ""),
        public_contracts: json_objects(&value, "public_contracts"),
        key_components: json_objects(&value, "key_components"),
        configs: json_objects(&value, "configs"),
        dependencies: json_string_list(&value, "dependencies"),
        risks: json_string_list(&value, "risks"),
        limitations: json_string_or(&value, "limitations", ""),
        evidence,
    })
}

/// Analyze one chunk
#[instrument(skip_all, fields(dir = %chunk.dir, chunk = chunk.index, total = chunk.total))]
pub async fn analyze_chunk(
    runner: &StageRunner,
    chunk: &FileChunk,
    repo_map_json: &str,
) -> Result<DirAnalysis> {
    let files_block = chunk.render();
    let request = runner
        .request(
            Stage::DirAnalysis,
            PromptTemplates::dir_analysis(&chunk.dir, repo_map_json, &files_block),
            JSON_ONLY_SYSTEM,
        )
        .with_schema(schemas::dir_analysis());

    let raw = runner.send(&request).await?;
    parse_dir_analysis(runner, &raw, chunk, &files_block)
}

/// Chunk and analyze every file of `dir`; failed chunks are skipped.
pub async fn analyze_directory<S: FileSource>(
    runner: &StageRunner,
    chunker: &ContextChunker<S>,
    dir: &str,
    files: &[String],
    max_context_chars: usize,
    repo_map_json: &str,
) -> Result<Vec<DirAnalysis>> {
    let budget =
        ChunkBudget::for_directory(max_context_chars, repo_map_json.chars().count(), dir);
    let chunks = chunker.chunk_dir(dir, files, budget);
    debug!(dir, chunks = chunks.len(), budget = budget.budget, "Analyzing directory");

    let mut analyses = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let context = format!("Directory analysis ({} {}/{})", dir, chunk.index, chunk.total);
        if let Some(analysis) = isolate(&context, analyze_chunk(runner, chunk, repo_map_json).await)? {
            analyses.push(analysis);
        }
    }

    info!(dir, chunks = chunks.len(), analyzed = analyses.len(), "Directory analyzed");
    Ok(analyses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::GroundError;
    use crate::wiki::stages::testing::*;
    use serde_json::json;

    fn chunk() -> FileChunk {
        FileChunk {
            dir: "src".into(),
            index: 1,
            total: 2,
            files: vec!["src/a.py".into(), "src/b.py".into()],
            body: "--- File: src/a.py (part 1/1) ---\n```text\ndef run(): pass\n```\n".into(),
        }
    }

    #[test]
    fn test_control_fields_and_files_from_header() {
        let provider = ScriptedProvider::fixed("");
        let runner = runner(provider);
        let chunk = chunk();
        let raw = json!([{
            "dir": "elsewhere",
            "chunk_index": 9,
            "files": [],
            "summary": "runner module",
            "risks": "none known",
            "evidence": ["`def run(): pass`", "src/a.py"],
        }])
        .to_string();

        let analysis = parse_dir_analysis(&runner, &raw, &chunk, &chunk.render()).unwrap();
        assert_eq!(analysis.dir, "src");
        assert_eq!((analysis.chunk_index, analysis.chunk_total), (1, 2));
        assert_eq!(analysis.files, vec!["src/a.py", "src/b.py"]);
        assert_eq!(analysis.risks, vec!["none known"]);
        assert_eq!(analysis.evidence, vec!["def run(): pass", "src/a.py"]);
    }

    #[test]
    fn test_evidence_fallback_uses_header() {
        let runner = runner(ScriptedProvider::fixed(""));
        let chunk = chunk();
        let raw = json!({"summary": "s", "evidence": ["invented.py"]}).to_string();

        let analysis = parse_dir_analysis(&runner, &raw, &chunk, &chunk.render()).unwrap();
        assert_eq!(analysis.evidence, vec!["src/a.py", "src/b.py"]);
    }

    #[test]
    fn test_evidence_without_fallback_rejects() {
        let mut config = Config::default();
        config.evidence.allow_fallback = false;
        let runner = runner_with(ScriptedProvider::fixed(""), &config);
        let chunk = chunk();
        let raw = json!({"summary": "s", "evidence": ["invented.py"]}).to_string();

        let result = parse_dir_analysis(&runner, &raw, &chunk, &chunk.render());
        assert!(matches!(result, Err(GroundError::Validation(_))));
    }

    #[tokio::test]
    async fn test_analyze_directory_skips_bad_chunks() {
        let provider = ScriptedProvider::new(|request| {
            if request.prompt.contains("src/bad.py") {
                Ok("not json at all".to_string())
            } else {
                Ok(json!({"summary": "good", "evidence": ["src/good.py", "Directory: src"]}).to_string())
            }
        });
        let runner = runner(provider.clone());
        let chunker = ContextChunker::new(|_: &str| Some(format!("{}\n", "x".repeat(1_500))));
        let files = vec!["src/bad.py".to_string(), "src/good.py".to_string()];

        // Minimum budget: the two files land in separate chunks
        let analyses = analyze_directory(&runner, &chunker, "src", &files, 0, "{}")
            .await
            .unwrap();
        assert_eq!(provider.requests().len(), 2);
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].summary, "good");
    }

    #[tokio::test]
    async fn test_analyze_directory_propagates_fatal() {
        let provider = ScriptedProvider::new(|_| Err(GroundError::Transport("reset".into())));
        let runner = runner(provider);
        let chunker = ContextChunker::new(|_: &str| Some("x".to_string()));
        let files = vec!["src/a.py".to_string()];

        let result = analyze_directory(&runner, &chunker, "src", &files, 0, "{}").await;
        assert!(result.is_err());
    }
}
