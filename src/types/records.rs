//! Pipeline Records
//!
//! Fixed-shape records produced by each generation stage. A record is built
//! from a coerced model response, validated, then handed to the next stage
//! by value; nothing mutates it afterwards.

use serde::{Deserialize, Serialize};

// =============================================================================
// Repository Map
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleGroup {
    pub name: String,
    pub path_prefixes: Vec<String>,
    pub responsibility: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicSurface {
    pub name: String,
    pub kind: String,
    pub location: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocGroupSuggestion {
    pub group_path: String,
    pub rationale: String,
    pub related_paths: Vec<String>,
}

/// Repository-level overview used as shared context by later stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoMap {
    pub repo: String,
    pub branch: String,
    pub generated_at: String,
    pub summary: String,
    pub module_groups: Vec<ModuleGroup>,
    pub public_surfaces: Vec<PublicSurface>,
    pub doc_group_suggestions: Vec<DocGroupSuggestion>,
    pub limitations: String,
    pub evidence: Vec<String>,
}

impl RepoMap {
    /// Placeholder map used when the repository-map stage fails
    pub fn minimal(repo: &str, branch: &str, generated_at: &str, limitations: &str) -> Self {
        Self {
            repo: repo.to_string(),
            branch: branch.to_string(),
            generated_at: generated_at.to_string(),
            limitations: limitations.to_string(),
            ..Default::default()
        }
    }

    /// Copy with every list bounded, for embedding in later prompts
    pub fn compact(
        &self,
        module_groups: usize,
        public_surfaces: usize,
        doc_groups: usize,
        evidence: usize,
    ) -> Self {
        Self {
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            generated_at: self.generated_at.clone(),
            summary: self.summary.clone(),
            module_groups: self.module_groups.iter().take(module_groups).cloned().collect(),
            public_surfaces: self
                .public_surfaces
                .iter()
                .take(public_surfaces)
                .cloned()
                .collect(),
            doc_group_suggestions: self
                .doc_group_suggestions
                .iter()
                .take(doc_groups)
                .cloned()
                .collect(),
            limitations: self.limitations.clone(),
            evidence: self.evidence.iter().take(evidence).cloned().collect(),
        }
    }
}

// =============================================================================
// Directory Analysis
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicContract {
    pub name: String,
    pub kind: String,
    pub defined_in: String,
    pub signature: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyComponent {
    pub name: String,
    pub defined_in: String,
    pub responsibility: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigEntry {
    pub name: String,
    pub defined_in: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub notes: String,
}

/// Analysis of one chunk of one directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirAnalysis {
    pub dir: String,
    pub chunk_index: usize,
    pub chunk_total: usize,
    pub files: Vec<String>,
    pub summary: String,
    pub public_contracts: Vec<PublicContract>,
    pub key_components: Vec<KeyComponent>,
    pub configs: Vec<ConfigEntry>,
    pub dependencies: Vec<String>,
    pub risks: Vec<String>,
    pub limitations: String,
    pub evidence: Vec<String>,
}

/// Per-directory aggregate of all chunk analyses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirBrief {
    pub dir: String,
    pub files_count: usize,
    pub public_contracts: Vec<String>,
    pub summary: String,
    pub evidence: Vec<String>,
}

// =============================================================================
// Documentation Records
// =============================================================================

/// One planned documentation page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocPlanItem {
    pub target_category: String,
    pub file_name: String,
    pub title: String,
    pub source_dirs: Vec<String>,
    pub reason: String,
    pub evidence: Vec<String>,
}

/// A generated page (plan page, API page or single-pass bootstrap doc)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocPage {
    pub target_category: String,
    pub file_name: String,
    pub content: String,
    pub evidence: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Noop,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Noop => write!(f, "noop"),
        }
    }
}

impl std::str::FromStr for ChangeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(ChangeAction::Create),
            "update" => Ok(ChangeAction::Update),
            "noop" => Ok(ChangeAction::Noop),
            other => Err(format!(
                "Unknown action '{}'. Valid values: create, update, noop",
                other
            )),
        }
    }
}

/// Documentation change derived from one commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub action: ChangeAction,
    pub target_category: String,
    pub file_name: String,
    pub content: String,
    pub evidence: Vec<String>,
    pub reason: String,
}

/// A file written by the pipeline, for the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenDoc {
    pub path: std::path::PathBuf,
    pub action: ChangeAction,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_action_parse() {
        assert_eq!("Create".parse::<ChangeAction>(), Ok(ChangeAction::Create));
        assert_eq!(" noop ".parse::<ChangeAction>(), Ok(ChangeAction::Noop));
        assert!("delete".parse::<ChangeAction>().is_err());
    }

    #[test]
    fn test_repo_map_compact_bounds_lists() {
        let map = RepoMap {
            repo: "org/repo".into(),
            evidence: (0..30).map(|i| format!("e{}", i)).collect(),
            module_groups: vec![ModuleGroup::default(); 40],
            ..Default::default()
        };
        let compact = map.compact(30, 60, 40, 20);
        assert_eq!(compact.evidence.len(), 20);
        assert_eq!(compact.module_groups.len(), 30);
        assert_eq!(compact.repo, "org/repo");
    }

    #[test]
    fn test_config_entry_type_rename() {
        let entry: ConfigEntry =
            serde_json::from_str(r#"{"name":"PORT","type":"int","defined_in":"a.py"}"#).unwrap();
        assert_eq!(entry.value_type, "int");
        assert_eq!(entry.notes, "");
    }
}
