//! Reverting the most recent organizer run.

use crate::file_organizer::{
    FileOrganizer, Operation, OperationLog, OrganizeError, OrganizeResult,
};
use chrono::Local;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct UndoReport {
    pub restored_files: usize,
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Moved files that are no longer where the history says.
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Files found at an original location and moved aside first.
    pub backups: Vec<PathBuf>,
    /// Destinations whose previous content the run replaced; that content
    /// is gone and cannot be brought back.
    pub overwritten: Vec<PathBuf>,
}

impl UndoReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

enum RestoreError {
    Missing(PathBuf),
    Failed(PathBuf, String),
}

pub struct UndoManager;

impl UndoManager {
    /// Moves every file of the last recorded run back, newest move first.
    ///
    /// Files that vanished since are skipped. A file now occupying an
    /// original location is renamed to `<name>.bak.<timestamp>` before the
    /// organized file returns. The history is deleted only if everything
    /// was restored.
    pub fn undo(base_path: &Path) -> OrganizeResult<UndoReport> {
        if !base_path.is_dir() {
            return Err(OrganizeError::TargetMissing {
                path: base_path.to_path_buf(),
            });
        }

        let log = OperationLog::load(base_path)?
            .ok_or_else(|| OrganizeError::NoHistory(base_path.to_path_buf()))?;
        tracing::info!(
            run = %log.timestamp.format("%Y-%m-%d %H:%M:%S"),
            operations = log.operations.len(),
            "undoing organization"
        );

        let mut report = UndoReport::default();
        for operation in log.operations.iter().rev() {
            match Self::restore_file(operation, &mut report.backups) {
                Ok(()) => {
                    report.restored_files += 1;
                    if operation.overwrote {
                        tracing::warn!(
                            file = %operation.new_path.display(),
                            "the file this run replaced cannot be restored"
                        );
                        report.overwritten.push(operation.new_path.clone());
                    }
                    Self::prune_empty_dirs(base_path, &operation.new_path);
                }
                Err(RestoreError::Missing(path)) => {
                    tracing::warn!(file = %path.display(), "file not found at expected location");
                    report
                        .skipped_files
                        .push((path, "file not found at expected location".to_string()));
                }
                Err(RestoreError::Failed(path, reason)) => {
                    tracing::warn!(file = %path.display(), reason = %reason, "restore failed");
                    report.failed_restores.push((path, reason));
                }
            }
        }

        if report.is_complete_success()
            && let Err(e) = OperationLog::delete(base_path)
        {
            tracing::warn!(error = %e, "could not delete history file");
        }

        Ok(report)
    }

    fn restore_file(operation: &Operation, backups: &mut Vec<PathBuf>) -> Result<(), RestoreError> {
        let original = &operation.original_path;
        if !operation.new_path.exists() {
            return Err(RestoreError::Missing(operation.new_path.clone()));
        }

        if original.exists() {
            let backup_path = Self::generate_backup_path(original);
            fs::rename(original, &backup_path).map_err(|e| {
                RestoreError::Failed(
                    original.clone(),
                    format!("could not back up conflicting file: {e}"),
                )
            })?;
            tracing::info!(file = %original.display(), backup = %backup_path.display(), "backed up");
            backups.push(backup_path);
        }

        FileOrganizer::move_file(&operation.new_path, original, false).map_err(|e| {
            RestoreError::Failed(
                operation.new_path.clone(),
                format!("failed to restore file: {e}"),
            )
        })?;
        tracing::info!(from = %operation.new_path.display(), to = %original.display(), "restored");
        Ok(())
    }

    /// Removes directories the run created and left empty, stopping at
    /// `base_path` or at the first directory that still has content.
    fn prune_empty_dirs(base_path: &Path, moved_to: &Path) {
        let mut dir = moved_to.parent();
        while let Some(current) = dir {
            if current == base_path || !current.starts_with(base_path) {
                break;
            }
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }

    /// `file.txt` becomes `file.txt.bak.20251109-143052`.
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut filename = original_path
            .file_name()
            .map(OsStr::to_os_string)
            .unwrap_or_else(|| OsString::from("file"));
        filename.push(format!(".bak.{timestamp}"));

        original_path.with_file_name(filename)
    }
}
