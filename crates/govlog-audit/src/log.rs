//! The per-session audit log facade.
//!
//! `GovernanceAuditLog` has two modes:
//!
//! - **Sharded** (the default): each instance is one session with its own
//!   shard under the active directory.  Reads merge the consolidated
//!   history with every shard currently present.
//! - **Legacy**: an explicit file path, appended to directly.  No session
//!   id, no shards, reads return the file in insertion order.
//!
//! Writes are fail-closed and return `Err`.  Reads are fail-open and never
//! do; what they could not read is listed in `ReadReport::skipped`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use govlog_contracts::{
    GovlogError, GovlogResult, LogConfig, LogEntry, ReadReport, SessionId, SkippedSource,
};
use govlog_core::{
    append_line,
    config::load_config,
    source::{absorb, keep_last, read_source, read_source_from, read_suffix, sort_chronological},
    GitRootResolver, LogLayout, MergeLedger, RootResolver,
};

/// Which backend a `GovernanceAuditLog` writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Sharded,
    Legacy,
}

#[derive(Debug, Clone)]
enum Backend {
    Sharded {
        layout: LogLayout,
        session: SessionId,
        created_at: DateTime<Utc>,
        shard_path: PathBuf,
        line_bytes_estimate: u64,
    },
    Legacy {
        path: PathBuf,
        line_bytes_estimate: u64,
    },
}

/// Append-only audit log for one agent session.
///
/// Construction does no I/O beyond resolving the repository root.  The
/// shard file is created by the first `log()` call.
#[derive(Debug, Clone)]
pub struct GovernanceAuditLog {
    backend: Backend,
}

impl GovernanceAuditLog {
    /// Resolve the repository root from the process working directory and
    /// open a new session there.
    pub fn discover() -> GovlogResult<Self> {
        Self::with_resolver(&GitRootResolver::new())
    }

    /// Open a new session at the root `resolver` returns, honouring the
    /// root's `govlog.toml`.
    pub fn with_resolver(resolver: &dyn RootResolver) -> GovlogResult<Self> {
        let root = resolver.resolve()?;
        let config = load_config(&root)?;
        Self::new(root, config)
    }

    /// Open a new session under an explicit repository root.
    pub fn new(repo_root: impl Into<PathBuf>, config: LogConfig) -> GovlogResult<Self> {
        let layout = LogLayout::new(repo_root, &config)?;
        let session = SessionId::generate();
        let created_at = Utc::now();
        let shard_path = layout.shard_path(created_at, &session);

        debug!(
            session_id = %session,
            shard = %shard_path.display(),
            "audit log session opened"
        );

        Ok(Self {
            backend: Backend::Sharded {
                layout,
                session,
                created_at,
                shard_path,
                line_bytes_estimate: config.tail_line_bytes_estimate,
            },
        })
    }

    /// Operate on a single JSONL file with plain append semantics.
    pub fn legacy(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Legacy {
                path: path.into(),
                line_bytes_estimate: LogConfig::default().tail_line_bytes_estimate,
            },
        }
    }

    /// Replace the generated session id.  Has no effect in legacy mode.
    pub fn with_session_id(mut self, id: SessionId) -> Self {
        if let Backend::Sharded {
            layout,
            session,
            created_at,
            shard_path,
            ..
        } = &mut self.backend
        {
            *shard_path = layout.shard_path(*created_at, &id);
            *session = id;
        }
        self
    }

    pub fn mode(&self) -> LogMode {
        match self.backend {
            Backend::Sharded { .. } => LogMode::Sharded,
            Backend::Legacy { .. } => LogMode::Legacy,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match &self.backend {
            Backend::Sharded { session, .. } => Some(session),
            Backend::Legacy { .. } => None,
        }
    }

    /// The file this instance appends to: its shard, or the legacy file.
    pub fn write_path(&self) -> &Path {
        match &self.backend {
            Backend::Sharded { shard_path, .. } => shard_path,
            Backend::Legacy { path, .. } => path,
        }
    }

    /// This session's shard.  `None` in legacy mode.
    pub fn shard_path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Sharded { shard_path, .. } => Some(shard_path),
            Backend::Legacy { .. } => None,
        }
    }

    pub fn layout(&self) -> Option<&LogLayout> {
        match &self.backend {
            Backend::Sharded { layout, .. } => Some(layout),
            Backend::Legacy { .. } => None,
        }
    }

    // ── Write path ────────────────────────────────────────────────────────────

    /// Append one entry and return it as written.
    ///
    /// Stamps `timestamp` (and, in sharded mode, `session_id`) unless the
    /// caller supplied them.  The line is written with a single
    /// open-append-flush-close, so a crash can lose only this entry.
    ///
    /// # Errors
    ///
    /// `ShardWriteFailed` if the directory cannot be created or the file
    /// cannot be appended to.  The entry is not written.
    pub fn log(&self, mut entry: LogEntry) -> GovlogResult<LogEntry> {
        entry.stamp_timestamp(Utc::now());

        let (path, dir) = match &self.backend {
            Backend::Sharded {
                layout,
                session,
                shard_path,
                ..
            } => {
                entry.stamp_session(session);
                (shard_path.as_path(), Some(layout.active_dir()))
            }
            Backend::Legacy { path, .. } => (
                path.as_path(),
                path.parent().filter(|p| !p.as_os_str().is_empty()),
            ),
        };

        let line = entry.to_line()?;

        if let Some(dir) = dir {
            fs::create_dir_all(dir).map_err(|e| GovlogError::ShardWriteFailed {
                path: dir.display().to_string(),
                reason: format!("cannot create directory: {e}"),
            })?;
        }

        append_line(path, &line).map_err(|e| GovlogError::ShardWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(
            path = %path.display(),
            session_id = entry.session_id().unwrap_or(""),
            "audit entry appended"
        );
        Ok(entry)
    }

    /// `log()` for a raw JSON value.  Non-objects are `InvalidEntry`.
    pub fn log_value(&self, value: Value) -> GovlogResult<LogEntry> {
        self.log(LogEntry::from_value(value)?)
    }

    // ── Read path ─────────────────────────────────────────────────────────────

    /// The most recent `n` entries, oldest first.  `n == 0` returns all.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        self.tail_report(n).entries
    }

    /// `tail()` plus the sources that had to be skipped.
    pub fn tail_report(&self, n: usize) -> ReadReport {
        match &self.backend {
            Backend::Sharded {
                layout,
                line_bytes_estimate,
                ..
            } => read_sharded(layout, n, *line_bytes_estimate),
            Backend::Legacy {
                path,
                line_bytes_estimate,
            } => {
                let mut report = ReadReport::default();
                absorb(&mut report, read_suffix(path, n, *line_bytes_estimate));
                keep_last(&mut report.entries, n);
                report
            }
        }
    }

    /// Every entry, in chronological order (insertion order in legacy mode).
    pub fn entries(&self) -> ReadReport {
        self.tail_report(0)
    }

    /// Iterate every readable entry.
    pub fn iter(&self) -> std::vec::IntoIter<LogEntry> {
        self.entries().entries.into_iter()
    }

    /// Number of entries across history and all readable shards.
    pub fn count(&self) -> usize {
        self.entries().entries.len()
    }
}

impl<'a> IntoIterator for &'a GovernanceAuditLog {
    type Item = LogEntry;
    type IntoIter = std::vec::IntoIter<LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Merge history with every present shard.
///
/// History only needs its last `n + shards` lines: it is sorted, so an
/// entry older than that window cannot be among the newest `n` overall.
/// Each shard is read from its merge ledger offset, so the part of a shard
/// that consolidation already copied into history is not counted twice.
/// The ledger is read before history: a consolidation landing between the
/// two can show an entry twice for this one read, but never hide one.
fn read_sharded(layout: &LogLayout, n: usize, line_bytes_estimate: u64) -> ReadReport {
    let mut report = ReadReport::default();
    let ledger = MergeLedger::load(&layout.ledger_path());

    let shards = match layout.list_shards() {
        Ok(shards) => shards,
        Err(e) => {
            warn!(dir = %layout.active_dir().display(), error = %e, "cannot list shards");
            report.skipped.push(SkippedSource {
                path: layout.active_dir().to_path_buf(),
                reason: e.to_string(),
            });
            Vec::new()
        }
    };

    let history = if n == 0 {
        read_source(layout.history_path())
    } else {
        read_suffix(
            layout.history_path(),
            n.saturating_add(shards.len()),
            line_bytes_estimate,
        )
    };
    absorb(&mut report, history);

    for shard in &shards {
        absorb(&mut report, read_source_from(shard, ledger.offset(shard)));
    }

    sort_chronological(&mut report.entries);
    keep_last(&mut report.entries, n);
    report
}
