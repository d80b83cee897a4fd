//! tidybot - rule-based file organizer
//!
//! Files in a target directory are matched against ordered rules (by
//! extension, name pattern, detected category or age) and moved into the
//! destination the first matching rule names. Runs can be previewed as a dry
//! run, repeated on a schedule, and undone from the recorded history.

pub mod cli;
pub mod config;
pub mod conflict;
pub mod file_category;
pub mod file_organizer;
pub mod filters;
pub mod logging;
pub mod output;
pub mod planner;
pub mod rules;
pub mod scanner;
pub mod scheduler;
pub mod undo;

pub use config::{ConfigError, ConfigFormat, OrganizerConfig};
pub use conflict::ConflictPolicy;
pub use file_category::{Category, FileMapper};
pub use file_organizer::{FileOrganizer, OrganizeError, Outcome, RunReport, organize};
pub use planner::{Action, Plan, SkipReason};
pub use scheduler::{Schedule, Scheduler};
pub use undo::{UndoManager, UndoReport};

pub use cli::{Cli, Command, run_cli};
