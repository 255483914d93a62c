//! Results of the read path and of consolidation.
//!
//! Reads are fail-open: each source either loads or is skipped, and the
//! skips travel next to the entries in a `ReadReport` instead of aborting
//! the call.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entry::LogEntry;

/// A source (history file, shard, legacy file) excluded from one read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

/// What happened when one source was read.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    /// Every non-blank line parsed.
    Loaded(Vec<LogEntry>),
    /// The file does not exist.  Not an error: shards come and go.
    Missing,
    /// The file could not be read or held a malformed line.
    Skipped(SkippedSource),
}

/// Entries gathered from every readable source, plus the sources skipped.
#[derive(Debug, Clone, Default)]
pub struct ReadReport {
    pub entries: Vec<LogEntry>,
    pub skipped: Vec<SkippedSource>,
}

impl ReadReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Summary of one `Consolidator::consolidate()` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationResult {
    /// Shards whose entries are now in history.
    pub shards_merged: usize,

    /// Entries newly added to history (duplicates already present excluded).
    pub entries_merged: usize,

    /// Shards that could not be read and were left untouched.
    pub shards_skipped: usize,

    /// Merged shards kept on disk because their owner appended meanwhile.
    /// Counted in `shards_merged` as well.
    pub shards_retained: usize,

    /// Total entries in history after the run.  Zero when the run did not
    /// rewrite history.
    pub history_entries: usize,

    /// Wall-clock time the run took.
    pub duration: Duration,

    /// Hex SHA-256 of the history this run wrote, `None` if it wrote none.
    pub history_digest: Option<String>,
}

impl ConsolidationResult {
    /// True when the run changed nothing on disk.
    pub fn is_noop(&self) -> bool {
        self.shards_merged == 0
    }
}
