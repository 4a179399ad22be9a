//! Run registry: which forecast runs exist, remotely and locally.
//!
//! A run is identified by its initialization timestamp, written as a
//! 14-character numeric string (`YYYYMMDDHHMMSS`, hour conventionally 00 or
//! 12). The registry unions the remote feed listing with a scan of the local
//! working directory; every identifier from either source appears exactly
//! once in the result.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{FeedError, RunIdError};
use crate::feed::ForecastFeed;

/// Timestamp layout of a run identifier.
const RUN_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Identifier of one forecast production cycle.
///
/// Equality is string equality; ordering is lexicographic, which for this
/// fixed-width format coincides with chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RunId(String);

impl RunId {
    /// Parses a run identifier, accepting exactly 14 ASCII digits.
    pub fn parse(value: &str) -> Result<Self, RunIdError> {
        if value.len() != 14 {
            return Err(RunIdError::InvalidLength(value.len()));
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RunIdError::NotNumeric(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The initialization time, if the digits form a valid timestamp.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0, RUN_ID_FORMAT).ok()
    }

    /// Human-readable initialization time, falling back to the raw digits.
    pub fn display_time(&self) -> String {
        self.timestamp()
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| self.0.clone())
    }

    /// The forecast cycle 12 hours before this one.
    pub fn previous_cycle(&self) -> Option<RunId> {
        let ts = self.timestamp()? - chrono::Duration::hours(12);
        Some(Self(ts.format(RUN_ID_FORMAT).to_string()))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = RunIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Lists immediate subdirectories of `root` whose names parse as run ids.
///
/// Anything else (files, differently named directories, unreadable entries)
/// is ignored, not reported as an error.
pub fn scan_run_dirs(root: &Path) -> BTreeSet<RunId> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| RunId::parse(name).ok())
        })
        .collect()
}

/// Produces the set of run identifiers to process.
pub struct RunRegistry {
    working_dir: PathBuf,
}

impl RunRegistry {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    /// Runs the remote feed advertises.
    pub async fn remote_runs(&self, feed: &dyn ForecastFeed) -> Result<BTreeSet<RunId>, FeedError> {
        Ok(feed.available_runs().await?.into_iter().collect())
    }

    /// Runs present as directories under the working root.
    pub fn local_runs(&self) -> BTreeSet<RunId> {
        scan_run_dirs(&self.working_dir)
    }
}
