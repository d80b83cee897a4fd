//! Turns scanned files into an ordered list of intended actions.
//!
//! Planning only reads the filesystem (to see which destinations are
//! occupied); carrying the plan out is [`crate::file_organizer`]'s job.

use crate::config::CompiledConfig;
use crate::conflict::Resolution;
use crate::scanner::FileFacts;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No rule matched and there is no `unmatched` destination.
    NoMatch,
    /// Destination occupied and the policy is `skip`.
    Conflict,
    /// The file already sits at its destination.
    AlreadyInPlace,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::NoMatch => "no matching rule",
            SkipReason::Conflict => "destination exists",
            SkipReason::AlreadyInPlace => "already organized",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move {
        source: PathBuf,
        destination: PathBuf,
        rule: String,
        /// The destination is occupied and will be replaced.
        overwrite: bool,
        /// The destination name differs from the source name.
        renamed: bool,
    },
    Skip {
        source: PathBuf,
        rule: Option<String>,
        reason: SkipReason,
    },
}

impl Action {
    pub fn source(&self) -> &Path {
        match self {
            Action::Move { source, .. } | Action::Skip { source, .. } => source,
        }
    }

    pub fn rule(&self) -> Option<&str> {
        match self {
            Action::Move { rule, .. } => Some(rule),
            Action::Skip { rule, .. } => rule.as_deref(),
        }
    }
}

/// Actions in scan order, one per scanned file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn move_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Move { .. }))
            .count()
    }

    pub fn skip_count(&self) -> usize {
        self.actions.len() - self.move_count()
    }
}

fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Decides what happens to each file.
///
/// Destinations claimed by earlier actions count as occupied, so two files
/// of one run never end up at the same path unless the policy is
/// `overwrite`.
pub fn plan(files: &[FileFacts], config: &CompiledConfig, now: DateTime<Local>) -> Plan {
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut actions = Vec::with_capacity(files.len());

    for facts in files {
        let Some(matched) = config.rules.first_match(facts, now) else {
            actions.push(Action::Skip {
                source: facts.path.clone(),
                rule: None,
                reason: SkipReason::NoMatch,
            });
            continue;
        };

        let wanted = config
            .target_directory
            .join(&matched.directory)
            .join(&facts.file_name);

        if wanted == facts.path {
            actions.push(Action::Skip {
                source: facts.path.clone(),
                rule: Some(matched.rule),
                reason: SkipReason::AlreadyInPlace,
            });
            continue;
        }

        let resolution = config.conflict.resolve(&wanted, now, |candidate| {
            claimed.contains(candidate) || occupied(candidate)
        });

        let (destination, overwrite) = match resolution {
            Resolution::Free(path) => (path, false),
            Resolution::Renamed(path) => (path, false),
            Resolution::Overwrite(path) => (path, true),
            Resolution::Skip => {
                actions.push(Action::Skip {
                    source: facts.path.clone(),
                    rule: Some(matched.rule),
                    reason: SkipReason::Conflict,
                });
                continue;
            }
        };

        claimed.insert(destination.clone());
        actions.push(Action::Move {
            renamed: destination.file_name() != Some(facts.file_name.as_os_str()),
            source: facts.path.clone(),
            destination,
            rule: matched.rule,
            overwrite,
        });
    }

    Plan { actions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConditionConfig, ConfigFormat, OrganizerConfig, RuleConfig};
    use crate::conflict::ConflictPolicy;
    use crate::file_category::Category;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn config(root: &Path, policy: ConflictPolicy) -> CompiledConfig {
        let mut config = OrganizerConfig::parse(
            "target_directory: /placeholder\nrules: []\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        config.target_directory = root.to_path_buf();
        config.conflict_resolution = policy;
        config.rules = vec![RuleConfig {
            name: Some("docs".to_string()),
            conditions: vec![ConditionConfig {
                extension: vec![".pdf".to_string()],
                destination: "Documents".to_string(),
                ..Default::default()
            }],
        }];
        config.compile().unwrap()
    }

    fn file(root: &Path, relative: &str) -> FileFacts {
        let path = root.join(relative);
        FileFacts::new(root, &path, Some(now()), Category::Document)
    }

    #[test]
    fn test_plan_moves_and_skips() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let compiled = config(root, ConflictPolicy::Rename);

        let plan = plan(
            &[file(root, "a.pdf"), file(root, "song.mp3")],
            &compiled,
            now(),
        );

        assert_eq!(
            plan.actions,
            vec![
                Action::Move {
                    source: root.join("a.pdf"),
                    destination: root.join("Documents").join("a.pdf"),
                    rule: "docs".to_string(),
                    overwrite: false,
                    renamed: false,
                },
                Action::Skip {
                    source: root.join("song.mp3"),
                    rule: None,
                    reason: SkipReason::NoMatch,
                },
            ]
        );
        assert_eq!(plan.move_count(), 1);
        assert_eq!(plan.skip_count(), 1);
    }

    #[test]
    fn test_plan_does_not_touch_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let compiled = config(root, ConflictPolicy::Rename);

        let _ = plan(&[file(root, "a.pdf")], &compiled, now());
        assert!(!root.join("Documents").exists());
    }

    #[test]
    fn test_file_already_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let compiled = config(root, ConflictPolicy::Rename);

        let plan = plan(&[file(root, "Documents/a.pdf")], &compiled, now());
        assert!(matches!(
            plan.actions[0],
            Action::Skip {
                reason: SkipReason::AlreadyInPlace,
                ..
            }
        ));
    }

    #[test]
    fn test_conflict_policies_against_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Documents")).unwrap();
        fs::write(root.join("Documents").join("a.pdf"), "old").unwrap();

        let skip = plan(&[file(root, "a.pdf")], &config(root, ConflictPolicy::Skip), now());
        assert!(matches!(
            skip.actions[0],
            Action::Skip {
                reason: SkipReason::Conflict,
                ..
            }
        ));

        let overwrite = plan(
            &[file(root, "a.pdf")],
            &config(root, ConflictPolicy::Overwrite),
            now(),
        );
        assert!(matches!(
            overwrite.actions[0],
            Action::Move {
                overwrite: true,
                renamed: false,
                ..
            }
        ));

        let rename = plan(&[file(root, "a.pdf")], &config(root, ConflictPolicy::Rename), now());
        match &rename.actions[0] {
            Action::Move {
                destination,
                renamed,
                overwrite,
                ..
            } => {
                assert!(*renamed);
                assert!(!*overwrite);
                assert_eq!(
                    destination,
                    &root.join("Documents").join("a_20240615_120000.pdf")
                );
            }
            other => panic!("expected a move, got {other:?}"),
        }
    }

    #[test]
    fn test_same_run_collisions_get_unique_names() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut compiled_files = Vec::new();
        for dir in ["one", "two", "three"] {
            compiled_files.push(file(root, &format!("{dir}/a.pdf")));
        }

        let plan = plan(&compiled_files, &config(root, ConflictPolicy::Rename), now());
        let destinations: HashSet<_> = plan
            .actions
            .iter()
            .filter_map(|action| match action {
                Action::Move { destination, .. } => Some(destination.clone()),
                Action::Skip { .. } => None,
            })
            .collect();

        assert_eq!(destinations.len(), 3);
        assert!(destinations.contains(&root.join("Documents").join("a.pdf")));
    }
}
