//! Terminal output: colored status lines, the run spinner and summary tables.
//!
//! Everything the user reads on stdout goes through [`OutputFormatter`];
//! diagnostics go through `tracing` instead.

use crate::file_organizer::{Outcome, RunReport};
use crate::planner::Action;
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

pub struct OutputFormatter;

impl OutputFormatter {
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// A spinner for runs whose file count is not known up front.
    ///
    /// Per-file lines should be printed with [`ProgressBar::println`] so they
    /// stay above it.
    pub fn create_spinner() -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {pos} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner
    }

    /// One line describing what happened to a file.
    ///
    /// Paths under `base` are shown relative to it.
    pub fn describe(action: &Action, outcome: &Outcome, base: &Path) -> String {
        let name = display_relative(action.source(), base);
        let rule = action
            .rule()
            .map(|r| format!(" [{r}]").dimmed().to_string())
            .unwrap_or_default();

        match outcome {
            Outcome::Moved(to) => format!(
                "{} {} → {}{}",
                "✓".green(),
                name,
                display_relative(to, base),
                rule
            ),
            Outcome::WouldMove(to) => format!(
                "{} {} → {}{}",
                "→".yellow(),
                name,
                display_relative(to, base),
                rule
            ),
            Outcome::Skipped(reason) => {
                format!("{} {} ({}){}", "-".dimmed(), name, reason, rule)
            }
            Outcome::Failed(reason) => format!("{} {}: {}", "✗".red(), name, reason),
        }
    }

    /// Prints processed files per rule.
    pub fn summary_table(rule_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");
        for line in summary_lines(rule_counts, total_files) {
            println!("{line}");
        }
    }

    pub fn run_summary(report: &RunReport) {
        if report.processed > 0 {
            Self::summary_table(&report.per_rule, report.processed);
        }

        let verb = if report.dry_run { "would be moved" } else { "moved" };
        println!();
        Self::plain(&format!(
            "{} {} {}, {} skipped",
            report.processed,
            files(report.processed),
            verb,
            report.skipped
        ));

        if !report.failed.is_empty() {
            Self::warning(&format!(
                "{} {} could not be organized:",
                report.failed.len(),
                files(report.failed.len())
            ));
            for (path, reason) in &report.failed {
                Self::error(&format!("  {}: {}", path.display(), reason));
            }
        }

        if report.dry_run {
            Self::dry_run_notice("No files were modified.");
        }
    }

    pub fn undo_summary(report: &UndoReport) {
        Self::success(&format!("Restored {} {}", report.restored_files, files(report.restored_files)));

        for backup in &report.backups {
            Self::info(&format!("  backed up existing file to {}", backup.display()));
        }

        for replaced in &report.overwritten {
            Self::warning(&format!(
                "  {} had replaced an existing file; that file cannot be restored",
                replaced.display()
            ));
        }

        if !report.skipped_files.is_empty() {
            Self::warning(&format!("Skipped {}:", report.skipped_files.len()));
            for (path, reason) in &report.skipped_files {
                Self::plain(&format!("  - {}: {}", path.display(), reason));
            }
        }

        if !report.failed_restores.is_empty() {
            Self::warning(&format!("Failed {}:", report.failed_restores.len()));
            for (path, reason) in &report.failed_restores {
                Self::error(&format!("  - {}: {}", path.display(), reason));
            }
        }

        if !report.is_complete_success() {
            Self::warning("History was kept; fix the issues above and run undo again.");
        }
    }
}

fn files(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn summary_lines(rule_counts: &BTreeMap<String, usize>, total_files: usize) -> Vec<String> {
    let width = rule_counts
        .keys()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Rule".len());

    let mut lines = vec![
        format!("{:<width$} | {}", "Rule".bold(), "Files".bold()),
        "-".repeat(width + 10),
    ];
    for (rule, count) in rule_counts {
        lines.push(format!(
            "{:<width$} | {} {}",
            rule,
            count.to_string().green(),
            files(*count)
        ));
    }
    lines.push("-".repeat(width + 10));
    lines.push(format!(
        "{:<width$} | {} {}",
        "Total".bold(),
        total_files.to_string().green().bold(),
        files(total_files)
    ));
    lines
}
