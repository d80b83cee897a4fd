//! Which files an organizer run looks at.
//!
//! Filters are applied before any rule is consulted. A file that fails the
//! filters is never moved, whatever the rules say.
//!
//! ```yaml
//! filters:
//!   enable_hidden_files: false
//!   exclude:
//!     filenames: [desktop.ini, Thumbs.db]
//!     patterns: ["*.part", "*.crdownload"]
//!     extensions: [tmp]
//!     regex: ['^~lock\.']
//!   include:
//!     patterns: [.env.example]
//! ```

use crate::config::ConfigError;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Prefix used by office suites for lock files of open documents.
const LOCK_FILE_PREFIX: &str = "~$";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether names starting with "." are considered.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist; wins over every exclusion.
    #[serde(default)]
    pub include: IncludeRules,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcludeRules {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filenames: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

/// Filter rules with every pattern compiled up front.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

pub(crate) fn compile_glob(pattern: &str) -> Result<Pattern, ConfigError> {
    Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
        pattern: pattern.to_string(),
        reason: e.msg.to_string(),
    })
}

pub(crate) fn compile_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

impl CompiledFilters {
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = rules
            .exclude
            .patterns
            .iter()
            .map(|p| compile_glob(p))
            .collect::<Result<Vec<_>, _>>()?;

        let include_patterns = rules
            .include
            .patterns
            .iter()
            .map(|p| compile_glob(p))
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|p| compile_regex(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Decides whether a file takes part in organization.
    ///
    /// `relative` is the file's path below the target directory; glob
    /// patterns are tried against it and against the bare file name.
    ///
    /// Order, first decision wins: include patterns, hidden files, office
    /// lock files, exact names, extensions, globs, regexes, default include.
    pub fn should_include(&self, relative: &Path) -> bool {
        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if Self::any_glob(&self.include_patterns, relative, &file_name) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if file_name.starts_with(LOCK_FILE_PREFIX) {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if Self::any_glob(&self.exclude_patterns, relative, &file_name) {
            return false;
        }

        if self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
        {
            return false;
        }

        true
    }

    /// Whether a recursive walk may enter a sub-directory.
    pub fn allows_directory(&self, dir_name: &str) -> bool {
        self.enable_hidden_files || !dir_name.starts_with('.')
    }

    fn any_glob(patterns: &[Pattern], relative: &Path, file_name: &str) -> bool {
        patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative) || pattern.matches(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(rules: FilterRules) -> CompiledFilters {
        CompiledFilters::new(&rules).unwrap()
    }

    #[test]
    fn test_hidden_files_excluded_by_default() {
        let filters = compiled(FilterRules::default());
        assert!(!filters.should_include(Path::new(".DS_Store")));
        assert!(filters.should_include(Path::new("report.pdf")));
    }

    #[test]
    fn test_hidden_files_included_when_enabled() {
        let filters = compiled(FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        });
        assert!(filters.should_include(Path::new(".bashrc")));
    }

    #[test]
    fn test_office_lock_files_always_excluded() {
        let filters = compiled(FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        });
        assert!(!filters.should_include(Path::new("~$budget.xlsx")));
    }

    #[test]
    fn test_exclude_filenames_and_extensions() {
        let filters = compiled(FilterRules {
            exclude: ExcludeRules {
                filenames: vec!["Thumbs.db".to_string()],
                extensions: vec![".part".to_string(), "tmp".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(!filters.should_include(Path::new("Thumbs.db")));
        assert!(!filters.should_include(Path::new("movie.mkv.part")));
        assert!(!filters.should_include(Path::new("scratch.TMP")));
        assert!(filters.should_include(Path::new("movie.mkv")));
    }

    #[test]
    fn test_exclude_glob_matches_nested_paths() {
        let filters = compiled(FilterRules {
            exclude: ExcludeRules {
                patterns: vec!["*.crdownload".to_string(), "node_modules/**".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(!filters.should_include(Path::new("setup.exe.crdownload")));
        assert!(!filters.should_include(Path::new("node_modules/left-pad/index.js")));
        assert!(filters.should_include(Path::new("src/index.js")));
    }

    #[test]
    fn test_exclude_regex_on_file_name() {
        let filters = compiled(FilterRules {
            exclude: ExcludeRules {
                regex: vec![r"^draft_\d+\.txt$".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(!filters.should_include(Path::new("draft_12.txt")));
        assert!(filters.should_include(Path::new("draft_final.txt")));
    }

    #[test]
    fn test_include_overrides_hidden_and_exclusions() {
        let filters = compiled(FilterRules {
            exclude: ExcludeRules {
                extensions: vec!["example".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec![".env.example".to_string()],
            },
            ..Default::default()
        });

        assert!(filters.should_include(Path::new(".env.example")));
        assert!(!filters.should_include(Path::new(".env")));
    }

    #[test]
    fn test_invalid_patterns_are_reported() {
        let glob_err = CompiledFilters::new(&FilterRules {
            exclude: ExcludeRules {
                patterns: vec!["[unclosed".to_string()],
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(glob_err, ConfigError::InvalidGlobPattern { .. }));

        let regex_err = CompiledFilters::new(&FilterRules {
            exclude: ExcludeRules {
                regex: vec!["(unclosed".to_string()],
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(regex_err, ConfigError::InvalidRegexPattern { .. }));
    }
}
