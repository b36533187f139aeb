//! Stage 3: per-directory briefs.
//!
//! Pure aggregation of chunk analyses; no model call.

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::pipeline::{BRIEF_MAX_CONTRACTS, BRIEF_MAX_EVIDENCE, BRIEF_MAX_SUMMARY_CHARS};
use crate::types::{DirAnalysis, DirBrief, truncate_chars};

#[derive(Default)]
struct Aggregate {
    files: BTreeSet<String>,
    summaries: Vec<String>,
    contracts: BTreeSet<String>,
    evidence: BTreeSet<String>,
}

/// One brief per directory, sorted by directory
pub fn build_dir_briefs(analyses: &[DirAnalysis]) -> Vec<DirBrief> {
    let mut by_dir: BTreeMap<&str, Aggregate> = BTreeMap::new();

    for analysis in analyses {
        let dir = analysis.dir.trim();
        if dir.is_empty() {
            continue;
        }
        let agg = by_dir.entry(dir).or_default();

        agg.files.extend(
            analysis
                .files
                .iter()
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(String::from),
        );
        let summary = analysis.summary.trim();
        if !summary.is_empty() {
            agg.summaries.push(summary.to_string());
        }
        agg.contracts.extend(
            analysis
                .public_contracts
                .iter()
                .map(|c| c.name.trim())
                .filter(|n| !n.is_empty())
                .map(String::from),
        );
        agg.evidence.extend(
            analysis
                .evidence
                .iter()
                .map(|e| e.trim())
                .filter(|e| !e.is_empty())
                .map(String::from),
        );
    }

    by_dir
        .into_iter()
        .map(|(dir, agg)| DirBrief {
            dir: dir.to_string(),
            files_count: agg.files.len(),
            public_contracts: agg.contracts.into_iter().take(BRIEF_MAX_CONTRACTS).collect(),
            summary: truncate_chars(&agg.summaries.join("\n"), BRIEF_MAX_SUMMARY_CHARS),
            evidence: agg.evidence.into_iter().take(BRIEF_MAX_EVIDENCE).collect(),
        })
        .collect()
}
