//! Prompt Builder System
//!
//! Standardized prompt construction for every generation stage.
//! Provides consistent structure across all pipeline prompts.
//!
//! ## Design Principles
//!
//! 1. **Role Definition**: Clear AI role for each task
//! 2. **Structured Objectives**: Numbered rules
//! 3. **Context Sections**: Source text the model may cite, clearly delimited
//! 4. **Focus Enforcement**: Nothing outside the supplied context
//! 5. **Output Shape**: Exact key list of the expected record

use crate::ai::validation::DocKind;

/// System instruction for stages that must answer with JSON only
pub const JSON_ONLY_SYSTEM: &str =
    "You are a documentation assistant that outputs JSON only. Never invent facts and never output anything except JSON.";

/// System instruction for the change-record stage
pub const UPDATE_SYSTEM: &str = "You are a documentation assistant that outputs JSON only. Never invent facts and never introduce symbols or behavior absent from the diff or summary.";

/// System instruction for the relevance gate
pub const RELEVANCE_SYSTEM: &str = "You are a documentation maintainer. Judge only from the given commit message and diff.";

/// System instruction for large-diff summarization
pub const DIFF_SUMMARY_SYSTEM: &str =
    "You are a technical summarizer who turns long code diffs into compact technical summaries.";

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered objectives
    Objectives(Vec<String>),
    /// Ordered key-value pairs
    Context(Vec<(String, String)>),
    /// Delimited source block the model may quote from
    Source { label: String, content: String },
    /// Code block with language
    Code { language: String, content: String },
    /// Focus enforcement with restrictions
    Focus {
        target: String,
        restrictions: Vec<String>,
    },
    /// Required output keys
    OutputKeys { shape: String, keys: Vec<String> },
    /// Raw text
    Custom(String),
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role definition section
    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    /// Add objectives section
    pub fn objectives<S: AsRef<str>>(mut self, objectives: &[S]) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.iter().map(|s| s.as_ref().to_string()).collect(),
        ));
        self
    }

    /// Add a context item; items share one section in insertion order
    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        let item = (key.to_string(), value.to_string());
        match self
            .sections
            .iter_mut()
            .find_map(|s| match s {
                PromptSection::Context(items) => Some(items),
                _ => None,
            }) {
            Some(items) => items.push(item),
            None => self.sections.push(PromptSection::Context(vec![item])),
        }
        self
    }

    /// Add a delimited source block
    pub fn source(mut self, label: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Source {
            label: label.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Add code block
    pub fn code(mut self, language: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Code {
            language: language.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Add focus enforcement section
    pub fn focus(mut self, target: &str, restrictions: &[&str]) -> Self {
        self.sections.push(PromptSection::Focus {
            target: target.to_string(),
            restrictions: restrictions.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Add the exact output key list
    pub fn output_keys(mut self, shape: &str, keys: &[&str]) -> Self {
        self.sections.push(PromptSection::OutputKeys {
            shape: shape.to_string(),
            keys: keys.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Add custom section
    pub fn custom(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Custom(content.to_string()));
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();
        let ends_with_source = matches!(self.sections.last(), Some(PromptSection::Source { .. }));

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<RULES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</RULES>\n\n");
                }
                PromptSection::Context(items) => {
                    prompt.push_str("# Context\n\n");
                    for (key, value) in items {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Source { label, content } => {
                    prompt.push_str(&format!("--- {} ---\n", label));
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Code { language, content } => {
                    prompt.push_str(&format!("```{}\n", language));
                    prompt.push_str(&content);
                    prompt.push_str("\n```\n\n");
                }
                PromptSection::Focus {
                    target,
                    restrictions,
                } => {
                    prompt.push_str("<FOCUS>\n");
                    prompt.push_str(&format!("IMPORTANT: Focus EXCLUSIVELY on: {}\n", target));
                    for restriction in restrictions {
                        prompt.push_str(&format!("- {}\n", restriction));
                    }
                    prompt.push_str("</FOCUS>\n\n");
                }
                PromptSection::OutputKeys { shape, keys } => {
                    prompt.push_str(&format!(
                        "Output must be {} whose keys are exactly (no more, no fewer):\n",
                        shape
                    ));
                    for key in keys {
                        prompt.push_str(&format!("- {}\n", key));
                    }
                    prompt.push('\n');
                }
                PromptSection::Custom(content) => {
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
            }
        }

        // Source text is cited verbatim, so only its separator is dropped
        if ends_with_source {
            let kept = prompt.len().saturating_sub(2);
            prompt.truncate(kept);
            prompt
        } else {
            prompt.trim_end().to_string()
        }
    }
}

fn frontmatter_block(today: &str) -> String {
    format!(
        "---\ntitle: (concise title)\ntype: (feature | improvement | refactor)\nstatus: (stable | experimental)\nlast_updated: {}\nrelated_base: (may be empty)\n---",
        today
    )
}

fn sections_list(kind: DocKind) -> String {
    kind.required_sections().join(" / ")
}

fn categories_line(categories: &[String]) -> String {
    if categories.is_empty() {
        "(no preset categories: derive group directories under the docs root from the repository layout)"
            .to_string()
    } else {
        categories.join(", ")
    }
}

const PATH_RULES: &str = "target_category is a path relative to the docs root and may be nested (e.g. core/api). \
Only letters, digits, `_`, `-` and `/` are allowed; it must not start with `.`, contain `..`, or be `snapshots`.";

const NO_INVENTION: &str =
    "Never invent: only cite paths, symbols and literals that appear in the supplied context.";

/// Preset prompt templates, one per generation stage
pub struct PromptTemplates;

impl PromptTemplates {
    /// Stage 1: repository map
    pub fn repo_map(repo_context: &str) -> String {
        PromptBuilder::new()
            .role(
                "software architect",
                "building a reusable repository map for per-directory analysis and documentation",
            )
            .objectives(&[
                NO_INVENTION,
                "Mark uncertainty: where implementation details are not visible, say they need verification against the source.",
                "module_groups items are {name, path_prefixes, responsibility}; public_surfaces items are {name, kind, location, notes}; doc_group_suggestions items are {group_path, rationale, related_paths}.",
                "generated_at is a YYYY-MM-DD date.",
                "evidence holds at least 5 items and every item must appear verbatim in the repository snapshot.",
            ])
            .output_keys("a JSON object", crate::ai::schemas::REPO_MAP_KEYS)
            .source("Repository snapshot", repo_context)
            .build()
    }

    /// Stage 2: one chunk of one directory
    pub fn dir_analysis(dir: &str, repo_map_json: &str, files_block: &str) -> String {
        PromptBuilder::new()
            .role(
                "software engineer",
                "structured analysis of one chunk of a source directory",
            )
            .focus(
                dir,
                &[
                    "Only cite content that appears in files_block (paths, symbols, literals)",
                    "Do NOT speculate about files you cannot see",
                ],
            )
            .objectives(&[
                "evidence holds at least 2 items, each a verbatim substring of files_block (file paths, class or function names work best).",
                "Output plain JSON: no ```json fence and no explanation.",
                "Keep the output small: apart from `files`, every array holds at most 5 items.",
                "Always output `files` as an empty array `[]`; it is filled from the chunk header.",
                "public_contracts items are {name, kind, defined_in, signature, notes}; key_components items are {name, defined_in, responsibility}; configs items are {name, defined_in, type, notes}.",
            ])
            .output_keys("a JSON object", crate::ai::schemas::DIR_ANALYSIS_KEYS)
            .source("RepoMap", repo_map_json)
            .source("files_block", files_block)
            .build()
    }

    /// Stage 3: documentation plan
    pub fn doc_plan(
        repo: &str,
        branch: &str,
        max_pages: usize,
        repo_map_json: &str,
        briefs_json: &str,
    ) -> String {
        PromptBuilder::new()
            .role(
                "documentation information architect",
                "planning modular, multi-entry documentation",
            )
            .context_item("Repository", repo)
            .context_item("Branch", branch)
            .objectives(&[
                PATH_RULES.to_string(),
                "Every page must be traceable: evidence holds at least 2 verbatim substrings of dir_briefs or the RepoMap (paths or symbol names work best).".to_string(),
                "source_dirs are chosen from the `dir` values of dir_briefs.".to_string(),
                "file_name is a bare .md file name without any path.".to_string(),
                format!(
                    "Plan at most {} pages; when over the limit keep pages about public contracts, APIs and extension points.",
                    max_pages
                ),
            ])
            .output_keys(
                "a JSON array; each item is an object",
                crate::ai::schemas::DOC_PLAN_KEYS,
            )
            .source("RepoMap", repo_map_json)
            .source("dir_briefs", briefs_json)
            .build()
    }

    /// Stage 4: one planned page
    pub fn doc_page(
        today: &str,
        plan_item_json: &str,
        repo_map_json: &str,
        analyses_json: &str,
    ) -> String {
        PromptBuilder::new()
            .role(
                "technical writer",
                "turning directory analyses into a publishable Markdown page",
            )
            .objectives(&[
                NO_INVENTION.to_string(),
                format!(
                    "content is Markdown starting with YAML frontmatter, including last_updated: {}",
                    today
                ),
                format!(
                    "content must contain the sections: {}",
                    sections_list(DocKind::PlanPage)
                ),
                "The Evidence section lists the evidence items (at least 2, verbatim strings).".to_string(),
            ])
            .output_keys("a JSON object", crate::ai::schemas::DOC_PAGE_KEYS)
            .source("plan item", plan_item_json)
            .source("RepoMap", repo_map_json)
            .source("Directory analyses (selected)", analyses_json)
            .custom(&format!("Frontmatter template:\n{}", frontmatter_block(today)))
            .build()
    }

    /// Optional stage: one API page per source module
    pub fn api_page(
        today: &str,
        module_path: &str,
        module_text: &str,
        language: &str,
        target_category: &str,
        file_name: &str,
        repo_map_json: &str,
    ) -> String {
        PromptBuilder::new()
            .role(
                "API documentation maintainer",
                "documenting one source module's public API",
            )
            .focus(
                module_path,
                &["Only describe symbols, signatures and behavior visible in the source"],
            )
            .objectives(&[
                format!(
                    "content is Markdown starting with YAML frontmatter, including last_updated: {}",
                    today
                ),
                format!(
                    "content must contain the sections: {}",
                    sections_list(DocKind::ApiPage)
                ),
                format!(
                    "evidence holds at least 2 items that appear in the source (e.g. `{}` or function and type names).",
                    module_path
                ),
                format!(
                    "The output path is fixed: target_category = {}, file_name = {}",
                    target_category, file_name
                ),
            ])
            .output_keys("a JSON object", crate::ai::schemas::DOC_PAGE_KEYS)
            .source("RepoMap", repo_map_json)
            .custom(&format!("--- Source: {} ---", module_path))
            .code(language, module_text)
            .build()
    }

    /// Single-pass bootstrap when no plan could be produced
    pub fn bootstrap_docs(
        repo: &str,
        branch: &str,
        today: &str,
        categories: &[String],
        repo_context: &str,
        existing_docs: &str,
    ) -> String {
        PromptBuilder::new()
            .role(
                "senior software engineer and technical writer",
                "producing an initial, verifiable documentation baseline",
            )
            .context_item("Repository", repo)
            .context_item("Branch", branch)
            .context_item("Recommended categories", &categories_line(categories))
            .objectives(&[
                "Only use the repository snapshot and existing docs below; where details are missing, say they need verification against the source instead of guessing interfaces.".to_string(),
                format!("Output a JSON array of at most {} objects.", crate::constants::pipeline::SINGLE_PASS_MAX_DOCS),
                PATH_RULES.to_string(),
                "file_name is a bare .md file name without any path, and never index.md.".to_string(),
                format!(
                    "content is Markdown starting with YAML frontmatter and contains at least: {}",
                    sections_list(DocKind::Bootstrap)
                ),
                "evidence holds at least 2 items, each a verbatim substring of the repository snapshot (paths, file names, directory names).".to_string(),
                "reason is one sentence on why the page belongs in the baseline.".to_string(),
                "Cover several categories; keep each page short (under 200 lines).".to_string(),
            ])
            .output_keys(
                "a JSON array; each item is an object",
                crate::ai::schemas::DOC_PAGE_KEYS,
            )
            .custom(&format!("Frontmatter template:\n{}", frontmatter_block(today)))
            .source("Repository snapshot", repo_context)
            .source("Existing docs (may be empty)", existing_docs)
            .build()
    }

    /// Incremental update: one change record for one commit
    pub fn doc_update(
        repo: &str,
        branch: &str,
        today: &str,
        categories: &[String],
        existing_docs: &str,
        processed_diff: &str,
        commit_message: &str,
    ) -> String {
        PromptBuilder::new()
            .role(
                "senior software engineer and technical writer",
                "maintaining developer documentation from code changes",
            )
            .context_item("Repository", repo)
            .context_item("Branch", branch)
            .context_item("Recommended categories", &categories_line(categories))
            .objectives(&[
                "Never invent: only describe changes the diff or summary directly supports.".to_string(),
                "Choose action: \"noop\" when third-party developers are unaffected (give a one-sentence reason); \"create\" for a new public contract or behavior; \"update\" for a significant revision of an existing page.".to_string(),
                "evidence holds at least 2 verbatim strings found in the diff/summary or the commit message (file paths or symbol names); otherwise answer noop.".to_string(),
                format!(
                    "content is Markdown starting with YAML frontmatter and must contain a `{}` section covering edge cases, compatibility and best practice.",
                    DocKind::Change.required_sections().join(", ")
                ),
                format!("For create: {}", PATH_RULES),
            ])
            .output_keys("a JSON object", crate::ai::schemas::CHANGE_KEYS)
            .custom(&format!("Frontmatter template:\n{}", frontmatter_block(today)))
            .source("Existing docs", existing_docs)
            .source("Change (diff or summary)", processed_diff)
            .source("Commit message", commit_message)
            .build()
    }

    /// YES/NO gate: does this change affect documented contracts?
    pub fn relevance(commit_message: &str, diff_snippet: &str) -> String {
        PromptBuilder::new()
            .custom("Decide whether the following commit affects third-party developers (plugin, adapter or API callers) so that developer documentation must be updated.")
            .source("Commit message", commit_message)
            .source("Diff snippet", diff_snippet)
            .objectives(&[
                "Update only when an external contract changes: public APIs, event or message models, configuration schema, plugin or adapter interfaces, compatibility or externally visible behavior.",
                "Internal refactors, UI details, logging or comments, CI configuration, tests and pure formatting usually need no update.",
            ])
            .custom("Answer only \"YES\" or \"NO\" (YES may be followed by one very short reason).")
            .build()
    }

    /// Large-diff summarization
    pub fn diff_summary(diff: &str) -> String {
        PromptBuilder::new()
            .role("system architect", "compressing large code diffs")
            .objectives(&[
                "Keep every added or modified class name, interface definition, important method signature and new configuration item.",
                "Describe changes in data flow or call chains clearly.",
                "Drop boilerplate, trivial import changes and pure formatting.",
            ])
            .source("Diff", diff)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_prompt() {
        let prompt = PromptBuilder::new()
            .role("code analyst", "Rust documentation")
            .objectives(&["Analyze code", "Generate docs"])
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("code analyst"));
        assert!(prompt.contains("<RULES>"));
        assert!(prompt.contains("1. Analyze code"));
        assert!(prompt.contains("2. Generate docs"));
    }

    #[test]
    fn test_focus_section() {
        let prompt = PromptBuilder::new()
            .focus("src/core", &["Do NOT speculate", "Stay focused"])
            .build();

        assert!(prompt.contains("<FOCUS>"));
        assert!(prompt.contains("src/core"));
        assert!(prompt.contains("Do NOT speculate"));
    }

    #[test]
    fn test_context_items_keep_order() {
        let prompt = PromptBuilder::new()
            .context_item("Repository", "org/project")
            .context_item("Branch", "main")
            .build();

        let repo = prompt.find("**Repository**: org/project").unwrap();
        let branch = prompt.find("**Branch**: main").unwrap();
        assert!(repo < branch);
    }

    #[test]
    fn test_source_is_verbatim() {
        let block = "Directory: src\nChunk: 1/1\nFiles in this chunk:\n- src/a.py\n";
        let prompt = PromptTemplates::dir_analysis("src", "{}", block);
        assert!(prompt.contains(block));
        assert!(prompt.contains("- public_contracts"));
    }

    #[test]
    fn test_trailing_source_keeps_final_newline() {
        let prompt = PromptBuilder::new()
            .source("Diff", "-old\n+new\n")
            .build();
        assert!(prompt.ends_with("+new\n"));

        let prompt = PromptBuilder::new().context_item("Repo", "x").build();
        assert_eq!(prompt, "# Context\n\n**Repo**: x");
    }

    #[test]
    fn test_page_prompts_name_required_sections() {
        let prompt = PromptTemplates::doc_page("2025-01-01", "{}", "{}", "[]");
        for section in DocKind::PlanPage.required_sections() {
            assert!(prompt.contains(section), "missing {section}");
        }
        assert!(prompt.contains("last_updated: 2025-01-01"));

        let prompt =
            PromptTemplates::api_page("2025-01-01", "src/api/x.py", "def f(): ...", "python", "api", "x.md", "{}");
        assert!(prompt.contains("## API List"));
        assert!(prompt.contains("```python\ndef f(): ..."));
    }

    #[test]
    fn test_relevance_prompt_does_not_request_json() {
        let prompt = PromptTemplates::relevance("fix", "diff --git a/x b/x");
        assert!(!prompt.to_lowercase().contains("json"));
        assert!(prompt.contains("\"YES\""));
    }

    #[test]
    fn test_categories_line() {
        assert!(categories_line(&[]).starts_with("(no preset categories"));
        assert_eq!(
            categories_line(&["core".to_string(), "api".to_string()]),
            "core, api"
        );
    }
}
