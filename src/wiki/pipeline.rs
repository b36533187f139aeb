//! Bootstrap and update pipelines.
//!
//! ## Bootstrap
//!
//! ```text
//! scan → repo context → RepoMap → chunk analyses → briefs → plan
//!                                                            ↓
//!                       single-pass docs (empty plan) ← ← pages
//!                                                            ↓
//!                                             API pages (optional)
//! ```
//!
//! ## Update
//!
//! ```text
//! path filter → relevance gate → diff preprocessing → change record → apply
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::stages::{
    StageRunner, analyze_directory, build_dir_briefs, generate_api_page, generate_bootstrap_docs,
    generate_change_record, generate_doc_page, generate_doc_plan, generate_repo_map,
    preprocess_diff, should_update_docs, to_prompt_json,
};
use super::writer::{DocContextLimits, DocWriter};
use crate::ai::chunker::{ContextChunker, DiskSource};
use crate::ai::provider::SharedProvider;
use crate::analyzer::{FileScanner, RepoContextBuilder, group_by_dir, read_text_prefix};
use crate::config::Config;
use crate::constants::context::MAX_API_MODULE_BYTES;
use crate::constants::pipeline::{
    COMPACT_DOC_GROUPS, COMPACT_EVIDENCE, COMPACT_MODULE_GROUPS, COMPACT_PUBLIC_SURFACES,
};
use crate::types::{ChangeAction, DirAnalysis, RepoMap, Result, WrittenDoc};

/// Source files documented as API modules
const API_MODULE_SUFFIXES: &[&str] = &[".py", ".rs"];

/// Package markers that never get their own API page
const API_SKIPPED_MODULES: &[&str] = &["__init__.py", "mod.rs"];

/// Outcome of one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub written: Vec<WrittenDoc>,
    pub files_scanned: usize,
    pub directories: usize,
    pub analyses: usize,
    pub planned_pages: usize,
    pub single_pass: bool,
    /// Why an update run wrote nothing
    pub skipped: Option<String>,
    pub duration_secs: f64,
}

/// Repository name from config, else the checkout's directory name
fn repo_name(config: &Config, repo_dir: &Path) -> String {
    let name = config.repo.name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    repo_dir
        .canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(repo_dir)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string())
}

// =============================================================================
// Bootstrap
// =============================================================================

pub struct BootstrapPipeline {
    config: Config,
    provider: SharedProvider,
    repo_dir: PathBuf,
    head: Option<String>,
    api_dir: Option<String>,
    today: Option<String>,
}

impl BootstrapPipeline {
    pub fn new(config: Config, provider: SharedProvider, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            provider,
            repo_dir: repo_dir.into(),
            head: None,
            api_dir: None,
            today: None,
        }
    }

    pub fn with_head(mut self, head: Option<String>) -> Self {
        self.head = head;
        self
    }

    /// Also generate one API page per module directly under `dir`
    pub fn with_api_dir(mut self, dir: Option<String>) -> Self {
        self.api_dir = dir
            .map(|d| d.trim().trim_matches('/').to_string())
            .filter(|d| !d.is_empty());
        self
    }

    pub fn with_today(mut self, today: &str) -> Self {
        self.today = Some(today.to_string());
        self
    }

    fn runner(&self, repo: &str) -> StageRunner {
        let runner = StageRunner::new(self.provider.clone(), &self.config, repo, &self.config.repo.branch);
        match &self.today {
            Some(today) => runner.with_today(today),
            None => runner,
        }
    }

    #[instrument(skip_all, fields(repo_dir = %self.repo_dir.display()))]
    pub async fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();
        let repo = repo_name(&self.config, &self.repo_dir);
        let runner = self.runner(&repo);
        let writer = DocWriter::new(&self.config.docs.root, &self.config.docs.default_category);
        let max_context_chars = self.config.chunking.max_context_chars;

        // Scan + context
        let paths = FileScanner::new(&self.repo_dir)
            .with_exclude(&self.config.repo.exclude)?
            .paths()?;
        summary.files_scanned = paths.len();
        info!(repo = %repo, files = paths.len(), "Repository scanned");

        let repo_context = RepoContextBuilder::new(
            &self.repo_dir,
            &repo,
            &self.config.repo.branch,
            max_context_chars,
        )
        .with_head(self.head.as_deref())
        .with_preferred_dir(self.api_dir.as_deref())
        .build(&paths);

        // RepoMap
        let repo_map = generate_repo_map(&runner, &repo_context).await?.compact(
            COMPACT_MODULE_GROUPS,
            COMPACT_PUBLIC_SURFACES,
            COMPACT_DOC_GROUPS,
            COMPACT_EVIDENCE,
        );
        let repo_map_json = to_prompt_json(&repo_map)?;

        // Directory analyses
        let chunker = ContextChunker::new(DiskSource::new(&self.repo_dir));
        let groups = group_by_dir(&paths);
        summary.directories = groups.len();
        let mut analyses: BTreeMap<String, Vec<DirAnalysis>> = BTreeMap::new();
        for (dir, files) in &groups {
            let dir_analyses =
                analyze_directory(&runner, &chunker, dir, files, max_context_chars, &repo_map_json)
                    .await?;
            if !dir_analyses.is_empty() {
                analyses.insert(dir.clone(), dir_analyses);
            }
        }
        let flat: Vec<DirAnalysis> = analyses.values().flatten().cloned().collect();
        summary.analyses = flat.len();

        // Plan + pages
        let briefs = build_dir_briefs(&flat);
        let plan = generate_doc_plan(&runner, &repo_map, &briefs, self.config.docs.max_pages).await?;
        summary.planned_pages = plan.len();

        if plan.is_empty() {
            warn!("Doc plan is empty, falling back to single-pass bootstrap");
            summary.single_pass = true;
            let existing = writer.existing_docs_context(DocContextLimits::from(&self.config.docs));
            let docs = generate_bootstrap_docs(
                &runner,
                &repo_context,
                &existing,
                &self.config.docs.categories,
            )
            .await?;
            for doc in &docs {
                summary.written.push(writer.write_page(doc)?);
            }
        } else {
            for item in &plan {
                if let Some(page) = generate_doc_page(&runner, item, &repo_map, &analyses).await? {
                    summary.written.push(writer.write_page(&page)?);
                }
            }
        }

        // API pages
        if let Some(api_dir) = &self.api_dir {
            let written = self
                .write_api_pages(&runner, &writer, &repo_map, &paths, api_dir)
                .await?;
            summary.written.extend(written);
        }

        summary.duration_secs = start.elapsed().as_secs_f64();
        info!(
            written = summary.written.len(),
            planned = summary.planned_pages,
            single_pass = summary.single_pass,
            duration_secs = summary.duration_secs,
            "Bootstrap finished"
        );
        Ok(summary)
    }

    async fn write_api_pages(
        &self,
        runner: &StageRunner,
        writer: &DocWriter,
        repo_map: &RepoMap,
        paths: &[String],
        api_dir: &str,
    ) -> Result<Vec<WrittenDoc>> {
        let category = &self.config.docs.api_category;
        let modules = api_modules(paths, api_dir);
        if modules.is_empty() {
            warn!(api_dir, "No API modules found");
            return Ok(Vec::new());
        }

        let mut written = Vec::new();
        let mut stems = Vec::new();
        for module in &modules {
            let Some(text) = read_text_prefix(&self.repo_dir, module, MAX_API_MODULE_BYTES) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            let stem = module_stem(module);
            let file_name = format!("{}.md", stem);
            if let Some(page) =
                generate_api_page(runner, repo_map, module, &text, category, &file_name).await?
            {
                written.push(writer.write_page(&page)?);
                stems.push(stem.to_string());
            }
        }

        if !stems.is_empty() {
            let index = api_index(api_dir, &self.config.repo.branch, &stems);
            let path = writer.write_markdown(category, "index.md", &index)?;
            written.push(WrittenDoc {
                path,
                action: ChangeAction::Create,
                title: format!("{} API", api_dir),
            });
        }
        info!(modules = modules.len(), pages = stems.len(), "API pages written");
        Ok(written)
    }
}

/// Source modules directly inside `api_dir`, sorted
fn api_modules(paths: &[String], api_dir: &str) -> Vec<String> {
    let mut modules: Vec<String> = paths
        .iter()
        .filter(|p| {
            let Some((parent, name)) = p.rsplit_once('/') else {
                return false;
            };
            parent == api_dir
                && API_MODULE_SUFFIXES.iter().any(|s| name.ends_with(s))
                && !API_SKIPPED_MODULES.contains(&name)
        })
        .cloned()
        .collect();
    modules.sort();
    modules
}

fn module_stem(module: &str) -> &str {
    let name = module.rsplit('/').next().unwrap_or(module);
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

fn api_index(api_dir: &str, branch: &str, stems: &[String]) -> String {
    let mut lines = vec![
        format!("# {} API ({})", api_dir, branch),
        String::new(),
        "Per-module API pages generated from the source.".to_string(),
        String::new(),
        "## Modules".to_string(),
        String::new(),
    ];
    lines.extend(stems.iter().map(|s| format!("- [{}](./{})", s, s)));
    lines.push(String::new());
    lines.join("\n")
}

// =============================================================================
// Update
// =============================================================================

pub struct UpdatePipeline {
    config: Config,
    provider: SharedProvider,
    today: Option<String>,
}

impl UpdatePipeline {
    pub fn new(config: Config, provider: SharedProvider) -> Self {
        Self {
            config,
            provider,
            today: None,
        }
    }

    pub fn with_today(mut self, today: &str) -> Self {
        self.today = Some(today.to_string());
        self
    }

    /// Apply at most one documentation change for a commit.
    #[instrument(skip_all, fields(force, diff_chars = diff.len()))]
    pub async fn run(&self, commit_message: &str, diff: &str, force: bool) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();
        let repo = if self.config.repo.name.trim().is_empty() {
            "repo".to_string()
        } else {
            self.config.repo.name.trim().to_string()
        };
        let mut runner =
            StageRunner::new(self.provider.clone(), &self.config, &repo, &self.config.repo.branch);
        if let Some(today) = &self.today {
            runner = runner.with_today(today);
        }
        let writer = DocWriter::new(&self.config.docs.root, &self.config.docs.default_category);

        if !should_update_docs(&runner, commit_message, diff, force).await {
            summary.skipped = Some("commit does not affect documented contracts".to_string());
            summary.duration_secs = start.elapsed().as_secs_f64();
            info!("No documentation update needed");
            return Ok(summary);
        }

        let processed = preprocess_diff(&runner, diff).await;
        let existing = writer.existing_docs_context(DocContextLimits::from(&self.config.docs));
        let record = generate_change_record(
            &runner,
            commit_message,
            &processed,
            &existing,
            &self.config.docs.categories,
        )
        .await?;

        match record {
            Some(record) => summary.written.push(writer.apply_change(&record)?),
            None => summary.skipped = Some("no valid change record (noop or rejected)".to_string()),
        }

        summary.duration_secs = start.elapsed().as_secs_f64();
        info!(written = summary.written.len(), "Update finished");
        Ok(summary)
    }
}
