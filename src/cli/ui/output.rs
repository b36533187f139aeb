use console::style;

use crate::types::ChangeAction;
use crate::wiki::RunSummary;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Aligned `label: value` line
    pub fn field(&self, label: &str, value: &str) {
        println!("  {:<14} {}", style(format!("{}:", label)).dim(), value);
    }

    /// Files written by a run, or why nothing was written
    pub fn run_summary(&self, summary: &RunSummary) {
        self.section("Run Summary");
        if summary.files_scanned > 0 {
            self.field("Files", &summary.files_scanned.to_string());
            self.field("Directories", &summary.directories.to_string());
            self.field("Analyses", &summary.analyses.to_string());
            let plan = if summary.single_pass {
                "empty (single-pass fallback)".to_string()
            } else {
                summary.planned_pages.to_string()
            };
            self.field("Planned", &plan);
        }
        self.field("Duration", &format!("{:.1}s", summary.duration_secs));

        if summary.written.is_empty() {
            match &summary.skipped {
                Some(reason) => self.info(&format!("Nothing written: {}", reason)),
                None => self.warning("Nothing written"),
            }
            return;
        }

        println!();
        for doc in &summary.written {
            let action = match doc.action {
                ChangeAction::Create => style("create").green(),
                ChangeAction::Update => style("update").cyan(),
                ChangeAction::Noop => style("noop").dim(),
            };
            println!("  {} {} {}", action, doc.path.display(), style(&doc.title).dim());
        }
        self.success(&format!("{} file(s) written", summary.written.len()));
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
