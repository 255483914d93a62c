//! On-disk layout of the sharded log.
//!
//! ```text
//! <repo_root>/
//!   <logs_dir>/                          # tracked
//!     governance_history.jsonl           # tracked, rewritten by consolidation
//!     .gitignore                         # ignores active/*
//!     active/
//!       .gitkeep
//!       .consolidate.lock
//!       .merged.json                     # merge progress of pending shards
//!       20260124T183045_a1b2c3d4.jsonl   # one shard per session
//! ```
//!
//! Shard names are `{YYYYMMDDTHHMMSS}_{session_id}.jsonl`: ASCII only, no
//! characters reserved on any mainstream filesystem, and lexical order
//! equals creation order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};

use govlog_contracts::{GovlogError, GovlogResult, LogConfig, SessionId};

use crate::config::validate_config;
use crate::ledger::LEDGER_FILE_NAME;

/// `strftime` pattern of the shard name's timestamp component.
pub const SHARD_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Extension every shard carries.
pub const SHARD_EXTENSION: &str = "jsonl";

/// Name of the consolidation lock file inside the active directory.
pub const LOCK_FILE_NAME: &str = ".consolidate.lock";

/// Resolved absolute paths for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    repo_root: PathBuf,
    logs_dir: PathBuf,
    active_dir: PathBuf,
    history_path: PathBuf,
}

impl LogLayout {
    /// Resolve `config` against `repo_root`.
    ///
    /// Returns `ConfigError` if any configured path is absolute or escapes
    /// its parent.
    pub fn new(repo_root: impl Into<PathBuf>, config: &LogConfig) -> GovlogResult<Self> {
        validate_config(config)?;
        let repo_root = repo_root.into();
        let logs_dir = repo_root.join(&config.logs_dir);
        let active_dir = logs_dir.join(&config.active_dir);
        let history_path = logs_dir.join(&config.history_file);
        Ok(Self {
            repo_root,
            logs_dir,
            active_dir,
            history_path,
        })
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn active_dir(&self) -> &Path {
        &self.active_dir
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn lock_path(&self) -> PathBuf {
        self.active_dir.join(LOCK_FILE_NAME)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.active_dir.join(LEDGER_FILE_NAME)
    }

    /// Path of the shard a session created at `created_at` writes to.
    pub fn shard_path(&self, created_at: DateTime<Utc>, session: &SessionId) -> PathBuf {
        self.active_dir.join(shard_file_name(created_at, session))
    }

    /// All shards currently in the active directory, sorted by name.
    ///
    /// A missing active directory is an empty list, not an error.
    pub fn list_shards(&self) -> GovlogResult<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.active_dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GovlogError::Io {
                    path: self.active_dir.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let mut shards: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| parse_shard_file_name(name).is_some())
            })
            .map(|entry| entry.path())
            .collect();
        shards.sort();
        Ok(shards)
    }
}

/// Build a shard file name.
pub fn shard_file_name(created_at: DateTime<Utc>, session: &SessionId) -> String {
    format!(
        "{}_{}.{}",
        created_at.format(SHARD_TIME_FORMAT),
        session,
        SHARD_EXTENSION
    )
}

/// Split a shard file name into its creation time and session id.
///
/// Returns `None` for anything that is not exactly a shard name.
pub fn parse_shard_file_name(name: &str) -> Option<(NaiveDateTime, SessionId)> {
    let stem = name.strip_suffix(SHARD_EXTENSION)?.strip_suffix('.')?;
    let (time, session) = stem.split_once('_')?;
    // Fixed-width: chrono would accept unpadded fields otherwise.
    if time.len() != 15 {
        return None;
    }
    let created = NaiveDateTime::parse_from_str(time, SHARD_TIME_FORMAT).ok()?;
    let session = SessionId::parse(session).ok()?;
    Some((created, session))
}
