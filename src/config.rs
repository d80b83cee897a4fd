//! Organizer configuration.
//!
//! Configuration is a YAML file (a `.toml` file is read as TOML) listing the
//! target directory and an ordered set of rules:
//!
//! ```yaml
//! target_directory: ~/Downloads
//! log_file: logs/organizer.log
//! conflict_resolution: rename
//! rules:
//!   - name: Organize by file type
//!     conditions:
//!       - extension: [.pdf, .doc, .docx, .txt]
//!         destination: Documents/{extension_group}
//! ```
//!
//! Loading validates everything up front: unknown placeholders, broken glob
//! or regex patterns and empty rules are reported before any file is touched.

use crate::conflict::ConflictPolicy;
use crate::filters::{CompiledFilters, FilterRules};
use crate::rules::{DateGroups, RuleSet};
use crate::scheduler::Schedule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },

    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("refusing to overwrite existing configuration {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
}

/// On-disk syntax of a configuration file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizerConfig {
    /// Directory whose files get organized.
    pub target_directory: PathBuf,

    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Default for `run` and `schedule` when `--dry-run` is not given.
    #[serde(default)]
    pub dry_run: bool,

    /// Also organize files in sub-directories of the target.
    #[serde(default)]
    pub recursive: bool,

    #[serde(default)]
    pub conflict_resolution: ConflictPolicy,

    #[serde(default)]
    pub date_groups: DateGroups,

    /// Destination for files no rule matches. Unset leaves them in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmatched: Option<String>,

    #[serde(default)]
    pub filters: FilterRules,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    pub rules: Vec<RuleConfig>,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("organizer.log")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub conditions: Vec<ConditionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filename_contains: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub older_than_days: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newer_than_days: Option<u64>,

    pub destination: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// `HH:MM`; when set, runs once a day at that local time instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_at: Option<String>,

    /// How often the scheduler wakes up to check for due runs.
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_poll_seconds() -> u64 {
    60
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            daily_at: None,
            poll_seconds: default_poll_seconds(),
        }
    }
}

/// Validated configuration with every pattern compiled.
#[derive(Debug)]
pub struct CompiledConfig {
    pub target_directory: PathBuf,
    pub recursive: bool,
    pub conflict: ConflictPolicy,
    pub filters: CompiledFilters,
    pub rules: RuleSet,
}

impl OrganizerConfig {
    /// Reads, parses, expands `~` and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&content, ConfigFormat::from_path(path))?;
        config.expand_home(dirs::home_dir().as_deref());
        config.validate()?;

        tracing::debug!(
            config = %path.display(),
            rules = config.rules.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parses configuration text without validating it.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(content)?),
            ConfigFormat::Toml => Ok(toml::from_str(content)?),
        }
    }

    /// Replaces a leading `~` in the target, log file and destinations.
    pub fn expand_home(&mut self, home: Option<&Path>) {
        let Some(home) = home else {
            return;
        };

        self.target_directory = expand_tilde(&self.target_directory, home);
        self.log_file = expand_tilde(&self.log_file, home);

        let destinations = self
            .rules
            .iter_mut()
            .flat_map(|rule| rule.conditions.iter_mut())
            .map(|condition| &mut condition.destination)
            .chain(self.unmatched.iter_mut());
        for destination in destinations {
            let expanded = expand_tilde(Path::new(destination.as_str()), home);
            *destination = expanded.to_string_lossy().into_owned();
        }
    }

    /// Checks everything that can be checked without touching the target.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "target_directory must not be empty".to_string(),
            ));
        }

        if self.rules.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one rule is required".to_string(),
            ));
        }

        let groups = self.date_groups;
        if groups.last_week < 0 || groups.last_week > groups.last_month {
            return Err(ConfigError::Invalid(format!(
                "date_groups: expected 0 <= last_week <= last_month, got {} and {}",
                groups.last_week, groups.last_month
            )));
        }

        Schedule::from_config(&self.schedule)?;
        self.compile().map(|_| ())
    }

    pub fn compile(&self) -> Result<CompiledConfig, ConfigError> {
        Ok(CompiledConfig {
            target_directory: self.target_directory.clone(),
            recursive: self.recursive,
            conflict: self.conflict_resolution,
            filters: CompiledFilters::new(&self.filters)?,
            rules: RuleSet::compile(&self.rules, self.unmatched.as_deref(), self.date_groups)?,
        })
    }

    /// Serializes in the given syntax.
    pub fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Yaml => Ok(serde_yaml::to_string(self)?),
            ConfigFormat::Toml => {
                toml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))
            }
        }
    }

    /// A starter configuration for a downloads folder.
    pub fn sample() -> Self {
        let condition = |destination: &str| ConditionConfig {
            destination: destination.to_string(),
            ..Default::default()
        };
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            target_directory: PathBuf::from("~/Downloads"),
            log_file: PathBuf::from("logs/organizer.log"),
            dry_run: false,
            recursive: false,
            conflict_resolution: ConflictPolicy::Rename,
            date_groups: DateGroups::default(),
            unmatched: None,
            filters: FilterRules {
                enable_hidden_files: false,
                exclude: crate::filters::ExcludeRules {
                    patterns: list(&["*.part", "*.crdownload"]),
                    ..Default::default()
                },
                include: Default::default(),
            },
            schedule: ScheduleConfig::default(),
            rules: vec![
                RuleConfig {
                    name: Some("Screenshots".to_string()),
                    conditions: vec![ConditionConfig {
                        extension: list(&[".png", ".jpg"]),
                        filename_contains: list(&["screenshot", "screen shot"]),
                        subfolder_pattern: Some("YYYY-MM".to_string()),
                        ..condition("Pictures/Screenshots")
                    }],
                },
                RuleConfig {
                    name: Some("Invoices".to_string()),
                    conditions: vec![ConditionConfig {
                        pattern: Some("*[Ii]nvoice*.pdf".to_string()),
                        subfolder_pattern: Some("YYYY".to_string()),
                        ..condition("Documents/Invoices")
                    }],
                },
                RuleConfig {
                    name: Some("Organize by file type".to_string()),
                    conditions: vec![
                        ConditionConfig {
                            extension: list(&[".pdf", ".doc", ".docx", ".txt"]),
                            ..condition("Documents/{extension_group}")
                        },
                        ConditionConfig {
                            category: Some("images".to_string()),
                            subfolder_pattern: Some("YYYY/MM".to_string()),
                            ..condition("Pictures")
                        },
                        ConditionConfig {
                            extension: list(&[".zip", ".tar", ".gz", ".7z"]),
                            ..condition("Archives/{date_group}")
                        },
                    ],
                },
                RuleConfig {
                    name: Some("Installers".to_string()),
                    conditions: vec![ConditionConfig {
                        extension: list(&[".dmg", ".exe", ".msi", ".deb", ".pkg"]),
                        ..condition("Installers")
                    }],
                },
            ],
        }
    }

    /// Writes [`OrganizerConfig::sample`] to `path`, creating parent
    /// directories. An existing file is only replaced with `force`.
    pub fn write_sample(path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }

        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let content = Self::sample().render(ConfigFormat::from_path(path))?;
        fs::write(path, content).map_err(io_error)?;
        tracing::info!(config = %path.display(), "sample configuration written");
        Ok(())
    }
}

/// Replaces a leading `~` component with `home`.
pub fn expand_tilde(path: &Path, home: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => home.join(components.as_path()),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
target_directory: /tmp/inbox
rules:
  - name: Docs
    conditions:
      - extension: [.pdf]
        destination: Documents/{extension_group}
"#;

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config = OrganizerConfig::parse(MINIMAL, ConfigFormat::Yaml).unwrap();

        assert_eq!(config.target_directory, PathBuf::from("/tmp/inbox"));
        assert_eq!(config.log_file, PathBuf::from("organizer.log"));
        assert!(!config.dry_run);
        assert_eq!(config.conflict_resolution, ConflictPolicy::Rename);
        assert_eq!(config.date_groups, DateGroups::default());
        assert_eq!(config.schedule, ScheduleConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_required_keys() {
        let no_rules = "target_directory: /tmp/inbox\n";
        assert!(matches!(
            OrganizerConfig::parse(no_rules, ConfigFormat::Yaml),
            Err(ConfigError::Yaml(_))
        ));

        let no_destination = r#"
target_directory: /tmp/inbox
rules:
  - conditions:
      - extension: [.pdf]
"#;
        assert!(OrganizerConfig::parse(no_destination, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn test_toml_configuration() {
        let content = r#"
target_directory = "/tmp/inbox"
conflict_resolution = "skip"

[[rules]]
name = "Docs"

[[rules.conditions]]
extension = [".pdf"]
destination = "Documents"
"#;
        let config = OrganizerConfig::parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.conflict_resolution, ConflictPolicy::Skip);
        assert_eq!(config.rules[0].conditions[0].destination, "Documents");
    }

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a")), ConfigFormat::Yaml);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = OrganizerConfig::parse(MINIMAL, ConfigFormat::Yaml).unwrap();

        let mut no_rules = base.clone();
        no_rules.rules.clear();
        assert!(no_rules.validate().is_err());

        let mut inverted = base.clone();
        inverted.date_groups = DateGroups {
            last_week: 40,
            last_month: 30,
        };
        assert!(inverted.validate().is_err());

        let mut zero_interval = base.clone();
        zero_interval.schedule.interval_minutes = 0;
        assert!(zero_interval.validate().is_err());

        let mut bad_time = base.clone();
        bad_time.schedule.daily_at = Some("25:99".to_string());
        assert!(bad_time.validate().is_err());

        let mut bad_placeholder = base.clone();
        bad_placeholder.rules[0].conditions[0].destination = "Docs/{colour}".to_string();
        assert!(bad_placeholder.validate().is_err());

        let mut bad_regex = base;
        bad_regex.filters.exclude.regex = vec!["(".to_string()];
        assert!(matches!(
            bad_regex.validate(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }

    #[test]
    fn test_expand_home() {
        let mut config = OrganizerConfig::parse(MINIMAL, ConfigFormat::Yaml).unwrap();
        config.target_directory = PathBuf::from("~/Downloads");
        config.log_file = PathBuf::from("~/logs/organizer.log");
        config.rules[0].conditions[0].destination = "~/Documents".to_string();
        config.unmatched = Some("Misc".to_string());

        config.expand_home(Some(Path::new("/home/ada")));

        assert_eq!(config.target_directory, PathBuf::from("/home/ada/Downloads"));
        assert_eq!(config.log_file, PathBuf::from("/home/ada/logs/organizer.log"));
        assert_eq!(
            PathBuf::from(&config.rules[0].conditions[0].destination),
            PathBuf::from("/home/ada/Documents")
        );
        assert_eq!(config.unmatched.as_deref(), Some("Misc"));
    }

    #[test]
    fn test_expand_tilde_only_touches_leading_component() {
        let home = Path::new("/home/ada");
        assert_eq!(expand_tilde(Path::new("~"), home), PathBuf::from("/home/ada"));
        assert_eq!(expand_tilde(Path::new("a/~/b"), home), PathBuf::from("a/~/b"));
        assert_eq!(expand_tilde(Path::new("~ada/x"), home), PathBuf::from("~ada/x"));
    }

    #[test]
    fn test_load_expands_tilde_to_home_directory() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, MINIMAL.replace("/tmp/inbox", "~/Downloads")).unwrap();

        let config = OrganizerConfig::load(&path).unwrap();

        assert_eq!(config.target_directory, home.join("Downloads"));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = OrganizerConfig::load(Path::new("/non/existent/config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_sample_round_trips_and_validates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("config.yaml");

        OrganizerConfig::write_sample(&path, false).unwrap();
        let loaded = OrganizerConfig::load(&path).unwrap();
        assert_eq!(loaded.rules, OrganizerConfig::sample().rules);

        let err = OrganizerConfig::write_sample(&path, false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));
        assert!(OrganizerConfig::write_sample(&path, true).is_ok());
    }

    #[test]
    fn test_toml_sample_is_readable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        OrganizerConfig::write_sample(&path, false).unwrap();
        let loaded = OrganizerConfig::load(&path).unwrap();
        assert_eq!(loaded.rules.len(), OrganizerConfig::sample().rules.len());
    }
}
