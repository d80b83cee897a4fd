//! Carries out an organization plan and keeps the history needed for undo.
//!
//! Real runs append every completed move to an [`OperationLog`] that is
//! saved as `.tidybot_history.json` inside the target directory after each
//! move. Dry runs
//! only log what would happen and never touch the filesystem.

use crate::config::{ConfigError, OrganizerConfig};
use crate::planner::{self, Action, Plan, SkipReason};
use crate::scanner::Scanner;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the history file kept in the target directory.
pub const HISTORY_FILE_NAME: &str = ".tidybot_history.json";

#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("target directory {} does not exist", .path.display())]
    TargetMissing { path: PathBuf },

    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write history file: {0}")]
    HistoryWriteFailed(#[source] std::io::Error),

    #[error("failed to read history file: {0}")]
    HistoryReadFailed(#[source] std::io::Error),

    #[error("invalid history file format: {0}")]
    InvalidHistoryFormat(#[from] serde_json::Error),

    #[error("no previous organization found to undo in {}", .0.display())]
    NoHistory(PathBuf),
}

pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// One completed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
    pub rule: String,
    /// A file previously at `new_path` was replaced.
    #[serde(default)]
    pub overwrote: bool,
}

/// All moves of one run, newest run only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLog {
    pub timestamp: DateTime<Local>,
    pub base_path: PathBuf,
    pub operations: Vec<Operation>,
}

impl OperationLog {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            timestamp: Local::now(),
            base_path,
            operations: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn history_file_path(base_path: &Path) -> PathBuf {
        base_path.join(HISTORY_FILE_NAME)
    }

    pub fn save(&self, base_path: &Path) -> OrganizeResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(Self::history_file_path(base_path), json)
            .map_err(OrganizeError::HistoryWriteFailed)
    }

    /// Loads the last run's log, `None` if there is none.
    pub fn load(base_path: &Path) -> OrganizeResult<Option<Self>> {
        let history_path = Self::history_file_path(base_path);
        if !history_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&history_path).map_err(OrganizeError::HistoryReadFailed)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn delete(base_path: &Path) -> OrganizeResult<()> {
        let history_path = Self::history_file_path(base_path);
        if history_path.exists() {
            fs::remove_file(&history_path).map_err(OrganizeError::HistoryWriteFailed)?;
        }
        Ok(())
    }
}

/// What became of one planned action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Moved(PathBuf),
    WouldMove(PathBuf),
    Skipped(SkipReason),
    Failed(String),
}

/// Totals of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub dry_run: bool,
    /// Files moved, or that would be moved in a dry run.
    pub processed: usize,
    pub skipped: usize,
    pub failed: Vec<(PathBuf, String)>,
    /// Processed files per rule name.
    pub per_rule: BTreeMap<String, usize>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Executes plans against one target directory.
pub struct FileOrganizer {
    base_path: PathBuf,
    dry_run: bool,
}

impl FileOrganizer {
    pub fn new(base_path: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            base_path: base_path.into(),
            dry_run,
        }
    }

    /// Runs every action of `plan` in order.
    ///
    /// A failing move is logged and counted; the remaining actions still run.
    /// `observer` sees each action together with its outcome.
    pub fn execute<F>(&self, plan: &Plan, mut observer: F) -> RunReport
    where
        F: FnMut(&Action, &Outcome),
    {
        let mut report = RunReport {
            dry_run: self.dry_run,
            ..Default::default()
        };
        let mut history = OperationLog::new(self.base_path.clone());
        let mut history_saved = true;

        for action in &plan.actions {
            let outcome = self.apply(action, &mut history);
            if matches!(outcome, Outcome::Moved(_)) {
                history_saved = self.save_history(&history, history_saved);
            }
            match &outcome {
                Outcome::Moved(_) | Outcome::WouldMove(_) => {
                    report.processed += 1;
                    if let Some(rule) = action.rule() {
                        *report.per_rule.entry(rule.to_string()).or_default() += 1;
                    }
                }
                Outcome::Skipped(_) => report.skipped += 1,
                Outcome::Failed(reason) => {
                    report.skipped += 1;
                    report
                        .failed
                        .push((action.source().to_path_buf(), reason.clone()));
                }
            }
            observer(action, &outcome);
        }

        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed.len(),
            dry_run = self.dry_run,
            "organization complete"
        );
        report
    }

    /// Persists the history so far, so an interrupted run can still be
    /// undone up to its last completed move. Warns only on the first failure.
    fn save_history(&self, history: &OperationLog, saved_before: bool) -> bool {
        match history.save(&self.base_path) {
            Ok(()) => true,
            Err(err) => {
                if saved_before {
                    tracing::warn!(error = %err, "could not save history, undo will not be available");
                }
                false
            }
        }
    }

    fn apply(&self, action: &Action, history: &mut OperationLog) -> Outcome {
        let (source, destination, rule, overwrite, renamed) = match action {
            Action::Skip {
                source,
                rule,
                reason,
            } => {
                match reason {
                    SkipReason::Conflict => tracing::info!(
                        file = %source.display(),
                        rule = rule.as_deref().unwrap_or_default(),
                        "skipping, destination exists"
                    ),
                    SkipReason::NoMatch | SkipReason::AlreadyInPlace => tracing::debug!(
                        file = %source.display(),
                        reason = %reason,
                        "skipping"
                    ),
                }
                return Outcome::Skipped(*reason);
            }
            Action::Move {
                source,
                destination,
                rule,
                overwrite,
                renamed,
            } => (source, destination, rule, *overwrite, *renamed),
        };

        if self.dry_run {
            tracing::info!(
                from = %source.display(),
                to = %destination.display(),
                rule = %rule,
                overwrite,
                "DRY RUN: would move"
            );
            return Outcome::WouldMove(destination.clone());
        }

        if overwrite {
            tracing::warn!(file = %destination.display(), "overwriting");
        } else if renamed {
            tracing::info!(
                from = %source.display(),
                to = %destination.display(),
                "destination exists, renaming"
            );
        }

        match Self::move_file(source, destination, overwrite) {
            Ok(()) => {
                tracing::info!(
                    from = %source.display(),
                    to = %destination.display(),
                    rule = %rule,
                    "moved"
                );
                history.add_operation(Operation {
                    original_path: source.clone(),
                    new_path: destination.clone(),
                    rule: rule.clone(),
                    overwrote: overwrite,
                });
                Outcome::Moved(destination.clone())
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not move file");
                Outcome::Failed(err.to_string())
            }
        }
    }

    /// Moves a single file, creating the destination directory as needed.
    ///
    /// Without `overwrite` an existing destination is never replaced. Moves
    /// across filesystems fall back to copy and delete.
    pub fn move_file(source: &Path, destination: &Path, overwrite: bool) -> OrganizeResult<()> {
        let move_error = |source_err| OrganizeError::FileMoveFailure {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            source: source_err,
        };

        if let Some(parent) = destination.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        if fs::symlink_metadata(destination).is_ok() {
            if !overwrite {
                return Err(move_error(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "destination already exists",
                )));
            }
            fs::remove_file(destination).map_err(move_error)?;
        }

        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::CrossesDevices => {
                fs::copy(source, destination).map_err(move_error)?;
                fs::remove_file(source).map_err(move_error)
            }
            Err(err) => Err(move_error(err)),
        }
    }
}

/// Scans, plans and executes one run for a loaded configuration.
///
/// `dry_run` overrides the configuration's own `dry_run` flag when set.
pub fn organize<F>(
    config: &OrganizerConfig,
    dry_run: Option<bool>,
    observer: F,
) -> OrganizeResult<RunReport>
where
    F: FnMut(&Action, &Outcome),
{
    let dry_run = dry_run.unwrap_or(config.dry_run);
    let compiled = config.compile()?;
    let target = &compiled.target_directory;

    if !target.is_dir() {
        tracing::error!(target = %target.display(), "target directory does not exist");
        return Err(OrganizeError::TargetMissing {
            path: target.clone(),
        });
    }

    tracing::info!(target = %target.display(), dry_run, "starting organization");

    let files = Scanner::new(&compiled.filters, compiled.recursive)
        .ignore(&config.log_file)
        .scan(target)?;
    let plan = planner::plan(&files, &compiled, Local::now());

    Ok(FileOrganizer::new(target.clone(), dry_run).execute(&plan, observer))
}
