//! Error types for the govlog write and consolidation paths.
//!
//! Only fatal conditions live here.  Read-path problems (a locked shard, a
//! torn trailing line) are never raised; they are reported as
//! [`SkippedSource`](crate::report::SkippedSource) values instead.

use thiserror::Error;

/// The unified error type for govlog.
#[derive(Debug, Error)]
pub enum GovlogError {
    /// The working directory is not inside a version-controlled tree.
    #[error("not a repository: '{path}': {reason}")]
    NotARepository { path: String, reason: String },

    /// An entry could not be appended to its shard or legacy file.
    ///
    /// Fail-closed: a session whose audit trail cannot be written must stop.
    #[error("shard write failed for '{path}': {reason}")]
    ShardWriteFailed { path: String, reason: String },

    /// The atomic history rewrite failed.  No shard was deleted.
    #[error("consolidation write failed: {reason}")]
    ConsolidationWriteFailed { reason: String },

    /// The history file contains a line that is not a JSON object.
    #[error("history '{path}' is corrupt at line {line}: {reason}")]
    HistoryCorrupt {
        path: String,
        line: usize,
        reason: String,
    },

    /// Another consolidation holds the lock.
    #[error("consolidation lock '{path}' still held after {waited_ms} ms")]
    ConsolidationLocked { path: String, waited_ms: u64 },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A session id is not exactly 8 ASCII alphanumeric characters.
    #[error("invalid session id '{value}': expected 8 ASCII alphanumeric characters")]
    InvalidSessionId { value: String },

    /// A value handed to the log is not a JSON object, or cannot be encoded.
    #[error("invalid log entry: {reason}")]
    InvalidEntry { reason: String },

    /// Any other filesystem failure, with the path involved.
    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },
}

/// Convenience alias used throughout the govlog crates.
pub type GovlogResult<T> = Result<T, GovlogError>;
