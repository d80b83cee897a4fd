//! Enumerates the files an organizer run should consider.

use crate::file_category::{Category, FileMapper};
use crate::file_organizer::{HISTORY_FILE_NAME, OrganizeError, OrganizeResult};
use crate::filters::CompiledFilters;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Everything the rules need to know about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFacts {
    /// Full path of the file.
    pub path: PathBuf,
    /// Path below the target directory.
    pub relative: PathBuf,
    /// File name exactly as on disk; destinations are built from this.
    pub file_name: OsString,
    /// Lossy UTF-8 copy of the name, for matching.
    pub name: String,
    /// File name without its last extension.
    pub stem: String,
    /// Last extension without the dot, as written on disk.
    pub extension: Option<String>,
    pub modified: Option<DateTime<Local>>,
    pub category: Category,
}

impl FileFacts {
    pub fn new(
        root: &Path,
        path: &Path,
        modified: Option<DateTime<Local>>,
        category: Category,
    ) -> Self {
        let lossy = |s: &OsStr| s.to_string_lossy().into_owned();
        Self {
            path: path.to_path_buf(),
            relative: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
            file_name: path.file_name().map(OsStr::to_os_string).unwrap_or_default(),
            name: path.file_name().map(lossy).unwrap_or_default(),
            stem: path.file_stem().map(lossy).unwrap_or_default(),
            extension: path.extension().map(lossy),
            modified,
            category,
        }
    }
}

/// Walks a target directory and collects [`FileFacts`] for eligible files.
pub struct Scanner<'a> {
    filters: &'a CompiledFilters,
    mapper: FileMapper,
    recursive: bool,
    ignored: HashSet<PathBuf>,
}

impl<'a> Scanner<'a> {
    pub fn new(filters: &'a CompiledFilters, recursive: bool) -> Self {
        Self {
            filters,
            mapper: FileMapper::default(),
            recursive,
            ignored: HashSet::new(),
        }
    }

    /// Never report this file, e.g. the log file when it lives inside the
    /// target directory.
    pub fn ignore(mut self, path: &Path) -> Self {
        self.ignored.insert(absolute(path));
        self
    }

    /// Lists eligible files in a stable (name-sorted) order.
    ///
    /// Unreadable entries and files that cannot be opened for writing are
    /// logged and left out; only a missing or unreadable root is an error.
    pub fn scan(&self, root: &Path) -> OrganizeResult<Vec<FileFacts>> {
        if !root.is_dir() {
            return Err(OrganizeError::TargetMissing {
                path: root.to_path_buf(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || self
                        .filters
                        .allows_directory(&entry.file_name().to_string_lossy())
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if let Some(facts) = self.inspect(root, path) {
                files.push(facts);
            }
        }

        tracing::debug!(root = %root.display(), count = files.len(), "scan finished");
        Ok(files)
    }

    fn inspect(&self, root: &Path, path: &Path) -> Option<FileFacts> {
        let relative = path.strip_prefix(root).unwrap_or(path);

        if relative == Path::new(HISTORY_FILE_NAME) || self.ignored.contains(&absolute(path)) {
            return None;
        }

        if !self.filters.should_include(relative) {
            tracing::debug!(file = %relative.display(), "excluded by filters");
            return None;
        }

        if let Err(err) = OpenOptions::new().append(true).open(path) {
            tracing::warn!(file = %path.display(), error = %err, "file is locked or inaccessible");
            return None;
        }

        let modified = match path.metadata().and_then(|m| m.modified()) {
            Ok(time) => Some(DateTime::<Local>::from(time)),
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "could not read file stats");
                None
            }
        };

        Some(FileFacts::new(
            root,
            path,
            modified,
            self.mapper.detect(path),
        ))
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterRules;
    use std::fs;
    use tempfile::TempDir;

    fn names(files: &[FileFacts]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.relative.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_file_facts_split_name() {
        let facts = FileFacts::new(
            Path::new("/in"),
            Path::new("/in/archive.tar.gz"),
            None,
            Category::Archive,
        );
        assert_eq!(facts.name, "archive.tar.gz");
        assert_eq!(facts.stem, "archive.tar");
        assert_eq!(facts.extension.as_deref(), Some("gz"));
        assert_eq!(facts.relative, PathBuf::from("archive.tar.gz"));
    }

    #[test]
    fn test_scan_top_level_only_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.pdf"), "a").unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested").join("c.txt"), "c").unwrap();

        let filters = CompiledFilters::new(&FilterRules::default()).unwrap();
        let files = Scanner::new(&filters, false).scan(root).unwrap();

        assert_eq!(names(&files), vec!["a.pdf", "b.txt"]);
        assert!(files.iter().all(|f| f.modified.is_some()));
    }

    #[test]
    fn test_scan_recursive_skips_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join("nested/deeper/c.txt"), "c").unwrap();
        fs::write(root.join(".git/config"), "x").unwrap();

        let filters = CompiledFilters::new(&FilterRules::default()).unwrap();
        let files = Scanner::new(&filters, true).scan(root).unwrap();

        assert_eq!(names(&files), vec!["nested/deeper/c.txt"]);
    }

    #[test]
    fn test_scan_skips_history_hidden_and_ignored_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(HISTORY_FILE_NAME), "{}").unwrap();
        fs::write(root.join(".DS_Store"), "").unwrap();
        fs::write(root.join("~$report.docx"), "").unwrap();
        fs::write(root.join("organizer.log"), "").unwrap();
        fs::write(root.join("keep.txt"), "").unwrap();

        let filters = CompiledFilters::new(&FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        })
        .unwrap();
        let files = Scanner::new(&filters, false)
            .ignore(&root.join("organizer.log"))
            .scan(root)
            .unwrap();

        assert_eq!(names(&files), vec![".DS_Store", "keep.txt"]);
    }

    #[test]
    fn test_scan_missing_root_is_an_error() {
        let filters = CompiledFilters::new(&FilterRules::default()).unwrap();
        let result = Scanner::new(&filters, false).scan(Path::new("/non/existent/path"));
        assert!(matches!(result, Err(OrganizeError::TargetMissing { .. })));
    }
}
