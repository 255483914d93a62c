//! On-disk layout configuration.
//!
//! `LogConfig` is deserialized from `govlog.toml` at the repository root.
//! Every key is optional; an absent file means all defaults.
//!
//! Example:
//! ```toml
//! logs_dir = "logs"
//! active_dir = "active"
//! history_file = "governance_history.jsonl"
//! tail_line_bytes_estimate = 512
//! consolidation_lock_timeout_ms = 5000
//! ```

use serde::{Deserialize, Serialize};

/// Paths and tuning knobs for the sharded log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Logs root, relative to the repository root.
    pub logs_dir: String,

    /// Directory holding per-session shards, relative to `logs_dir`.
    pub active_dir: String,

    /// Canonical history file name, relative to `logs_dir`.
    pub history_file: String,

    /// Guess at the average encoded entry size.  Sizes the first suffix
    /// window `tail()` reads from the history file; the window doubles
    /// until it holds enough lines.
    pub tail_line_bytes_estimate: u64,

    /// How long a consolidation waits for a concurrent one to finish.
    pub consolidation_lock_timeout_ms: u64,
}

impl LogConfig {
    /// Name of the config file looked up at the repository root.
    pub const FILE_NAME: &'static str = "govlog.toml";
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            logs_dir: "logs".to_string(),
            active_dir: "active".to_string(),
            history_file: "governance_history.jsonl".to_string(),
            tail_line_bytes_estimate: 512,
            consolidation_lock_timeout_ms: 5_000,
        }
    }
}
