//! What happens when a destination is already occupied.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Configured reaction to an occupied destination (`conflict_resolution`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the source file where it is.
    Skip,
    /// Replace the file at the destination.
    Overwrite,
    /// Move under a timestamped, unique name next to the occupied one.
    #[default]
    Rename,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConflictPolicy::Skip => "skip",
            ConflictPolicy::Overwrite => "overwrite",
            ConflictPolicy::Rename => "rename",
        };
        f.write_str(name)
    }
}

/// Outcome of checking a destination against a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing there, use the destination unchanged.
    Free(PathBuf),
    /// Occupied; the occupant is to be replaced.
    Overwrite(PathBuf),
    /// Occupied; use this alternative name instead.
    Renamed(PathBuf),
    /// Occupied; leave the source alone.
    Skip,
}

impl ConflictPolicy {
    /// Resolves `destination`.
    ///
    /// `is_taken` reports whether a path is occupied, either on disk or by an
    /// earlier action of the same run.
    pub fn resolve<F>(self, destination: &Path, now: DateTime<Local>, is_taken: F) -> Resolution
    where
        F: Fn(&Path) -> bool,
    {
        if !is_taken(destination) {
            return Resolution::Free(destination.to_path_buf());
        }

        match self {
            ConflictPolicy::Skip => Resolution::Skip,
            ConflictPolicy::Overwrite => Resolution::Overwrite(destination.to_path_buf()),
            ConflictPolicy::Rename => Resolution::Renamed(unique_name(destination, now, is_taken)),
        }
    }
}

/// Builds `<stem>_<YYYYmmdd_HHMMSS>[_<n>]<.ext>` next to `destination`,
/// counting `n` up from 2 until `is_taken` reports a free path.
pub fn unique_name<F>(destination: &Path, now: DateTime<Local>, is_taken: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    let stem = destination.file_stem().unwrap_or_default();
    let extension = destination.extension();
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();

    let candidate_name = |counter: Option<u64>| {
        let mut name = OsString::from(stem);
        name.push(format!("_{stamp}"));
        if let Some(counter) = counter {
            name.push(format!("_{counter}"));
        }
        if let Some(extension) = extension {
            name.push(".");
            name.push(extension);
        }
        destination.with_file_name(name)
    };

    let candidate = candidate_name(None);
    if !is_taken(&candidate) {
        return candidate;
    }

    let mut counter: u64 = 2;
    loop {
        let candidate = candidate_name(Some(counter));
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
