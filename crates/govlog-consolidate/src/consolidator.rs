//! Merge pending shards into the canonical history.
//!
//! Ordering is the safety invariant:
//!
//!   lock → enumerate → read history → read shards → sort → atomic write
//!   → update merge ledger → delete
//!
//! A shard is deleted only after the history that contains it has been
//! renamed into place.  A crash before the rename leaves everything as it
//! was.  A shard that outlives a run (it grew, or its delete failed) keeps
//! its merged length in the merge ledger, so the next run skips that
//! prefix.  A shard about to be deleted is dropped from the ledger first,
//! so a crash between the rename and the delete makes the next run merge
//! it a second time.  Duplicates are possible there, lost entries are not.
//!
//! Entries are never compared by content.  Two identical entries logged
//! by the same session are two entries.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use govlog_contracts::{ConsolidationResult, GovlogError, GovlogResult, LogConfig, LogEntry};
use govlog_core::{
    atomic_write,
    config::load_config,
    fsutil::file_len,
    source::{parse_jsonl, sort_chronological, unmerged},
    GitRootResolver, LogLayout, MergeLedger, RootResolver,
};

use crate::lock::ConsolidationLock;

/// A shard as it was when read, so deletion can tell whether it grew.
struct ReadShard {
    path: PathBuf,
    len: u64,
    entries: Vec<LogEntry>,
}

/// Merges shards into history for one repository.
///
/// Safe to run repeatedly and from several processes at once: runs are
/// serialized by an advisory lock, and a run with nothing to merge changes
/// nothing.
#[derive(Debug, Clone)]
pub struct Consolidator {
    layout: LogLayout,
    lock_timeout: Duration,
}

impl Consolidator {
    pub fn new(layout: LogLayout) -> Self {
        Self {
            layout,
            lock_timeout: Duration::from_millis(LogConfig::default().consolidation_lock_timeout_ms),
        }
    }

    /// Consolidator for `repo_root` laid out according to `config`.
    pub fn for_repo(repo_root: impl Into<PathBuf>, config: &LogConfig) -> GovlogResult<Self> {
        Ok(Self::new(LogLayout::new(repo_root, config)?)
            .with_lock_timeout(Duration::from_millis(config.consolidation_lock_timeout_ms)))
    }

    /// Consolidator for the repository containing the working directory.
    pub fn discover() -> GovlogResult<Self> {
        let root = GitRootResolver::new().resolve()?;
        let config = load_config(&root)?;
        Self::for_repo(root, &config)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn layout(&self) -> &LogLayout {
        &self.layout
    }

    /// Merge every pending shard into history and delete the merged shards.
    ///
    /// # Errors
    ///
    /// - `ConsolidationLocked` if another run holds the lock past the timeout.
    /// - `HistoryCorrupt` if the existing history cannot be parsed; nothing
    ///   is rewritten, since doing so would drop the unparseable lines.
    /// - `ConsolidationWriteFailed` if the atomic rewrite fails; no shard is
    ///   deleted and the run can simply be retried.
    /// - `Io` if the active directory cannot be listed or the lock file
    ///   cannot be opened.
    ///
    /// Individual unreadable shards are not errors: they are skipped, left
    /// in place, and counted in `shards_skipped`.
    pub fn consolidate(&self) -> GovlogResult<ConsolidationResult> {
        let started = Instant::now();
        let mut result = ConsolidationResult::default();

        if !self.layout.active_dir().is_dir() {
            debug!(dir = %self.layout.active_dir().display(), "no active directory; nothing to do");
            result.duration = started.elapsed();
            return Ok(result);
        }

        let _lock = ConsolidationLock::acquire(&self.layout.lock_path(), self.lock_timeout)?;

        let ledger_path = self.layout.ledger_path();
        let shard_paths = self.layout.list_shards()?;
        let mut ledger = MergeLedger::load(&ledger_path);
        let pruned = ledger.retain_shards(&shard_paths);

        if shard_paths.is_empty() {
            if pruned {
                save_ledger(&ledger, &ledger_path);
            }
            debug!("no pending shards; nothing to do");
            result.duration = started.elapsed();
            return Ok(result);
        }

        let mut merged = self.read_history()?;
        let history_before = merged.len();

        let mut shards = Vec::with_capacity(shard_paths.len());
        for path in shard_paths {
            let offset = ledger.offset(&path);
            match read_shard(path, offset) {
                ShardRead::Loaded(shard) => shards.push(shard),
                ShardRead::Gone => {}
                ShardRead::Skipped => result.shards_skipped += 1,
            }
        }

        if shards.is_empty() {
            warn!(
                skipped = result.shards_skipped,
                "no readable shards; history left untouched"
            );
            result.duration = started.elapsed();
            return Ok(result);
        }

        for shard in &mut shards {
            merged.append(&mut shard.entries);
        }
        result.entries_merged = merged.len() - history_before;

        if result.entries_merged > 0 {
            // History first, then shards in name order, then line order: the
            // stable sort keeps that order among equal timestamps.
            sort_chronological(&mut merged);

            let mut content = String::new();
            for entry in &merged {
                content.push_str(&entry.to_line()?);
                content.push('\n');
            }

            atomic_write(self.layout.history_path(), content.as_bytes()).map_err(|e| {
                GovlogError::ConsolidationWriteFailed {
                    reason: format!(
                        "cannot replace '{}': {}",
                        self.layout.history_path().display(),
                        e
                    ),
                }
            })?;

            result.history_entries = merged.len();
            result.history_digest = Some(hex::encode(Sha256::digest(content.as_bytes())));
        } else {
            debug!("pending shards were already merged; history left untouched");
        }

        // History now holds every shard up to the length it was read at.
        // A shard about to be deleted leaves the ledger first: its session
        // may recreate it under the same name, and a stale offset would skip
        // the new lines.  One that grew keeps its merged length.
        for shard in &shards {
            match file_len(&shard.path) {
                Some(len) if len != shard.len => ledger.record(&shard.path, shard.len),
                _ => ledger.forget(&shard.path),
            }
        }
        save_ledger(&ledger, &ledger_path);

        let mut kept = false;
        for shard in &shards {
            result.shards_merged += 1;
            if !remove_if_unchanged(shard) {
                result.shards_retained += 1;
                ledger.record(&shard.path, shard.len);
                kept = true;
            }
        }
        if kept {
            save_ledger(&ledger, &ledger_path);
        }

        result.duration = started.elapsed();
        info!(
            shards_merged = result.shards_merged,
            shards_retained = result.shards_retained,
            shards_skipped = result.shards_skipped,
            entries_merged = result.entries_merged,
            history_entries = result.history_entries,
            duration_ms = result.duration.as_millis() as u64,
            "consolidation complete"
        );
        Ok(result)
    }

    /// Parse the whole history.  Missing history is empty; any bad line is fatal.
    fn read_history(&self) -> GovlogResult<Vec<LogEntry>> {
        let path = self.layout.history_path();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(GovlogError::HistoryCorrupt {
                    path: path.display().to_string(),
                    line: 0,
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                return Err(GovlogError::Io {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        parse_jsonl(&text).map_err(|e| GovlogError::HistoryCorrupt {
            path: path.display().to_string(),
            line: e.line,
            reason: e.reason,
        })
    }
}

enum ShardRead {
    Loaded(ReadShard),
    Gone,
    Skipped,
}

fn read_shard(path: PathBuf, offset: u64) -> ShardRead {
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return ShardRead::Gone,
        Err(e) => {
            warn!(shard = %path.display(), error = %e, "skipping unreadable shard");
            return ShardRead::Skipped;
        }
    };

    let parsed = std::str::from_utf8(unmerged(&bytes, offset))
        .map_err(|e| e.to_string())
        .and_then(|text| parse_jsonl(text).map_err(|e| format!("line {}: {}", e.line, e.reason)));

    match parsed {
        Ok(entries) => ShardRead::Loaded(ReadShard {
            len: bytes.len() as u64,
            path,
            entries,
        }),
        Err(reason) => {
            warn!(shard = %path.display(), reason = %reason, "skipping malformed shard");
            ShardRead::Skipped
        }
    }
}

/// A failed ledger write costs duplicates on a later run, never entries.
fn save_ledger(ledger: &MergeLedger, path: &Path) {
    if let Err(e) = ledger.save(path) {
        warn!(path = %path.display(), error = %e, "cannot write merge ledger");
    }
}

/// Delete a merged shard unless its owner appended after it was read.
///
/// Returns `false` if the shard was kept.  The caller records a kept
/// shard in the merge ledger at the length that was merged, so the next run
/// picks up only what was appended since.
///
/// The length check and the delete are two steps.  An append from the
/// owning session that lands between them is deleted with the shard and
/// lost.  Writers take no lock, so this gap cannot be closed here; it is
/// as wide as one `stat` call.
fn remove_if_unchanged(shard: &ReadShard) -> bool {
    match file_len(&shard.path) {
        None => true,
        Some(len) if len != shard.len => {
            warn!(
                shard = %shard.path.display(),
                read_bytes = shard.len,
                current_bytes = len,
                "shard grew during consolidation; keeping it for the next run"
            );
            false
        }
        Some(_) => match fs::remove_file(&shard.path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(shard = %shard.path.display(), error = %e, "cannot delete merged shard");
                false
            }
        },
    }
}
