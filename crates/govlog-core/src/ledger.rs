//! Per-shard merge progress.
//!
//! `<active_dir>/.merged.json` maps a shard's file name to how many of its
//! bytes are already in history.  Consolidation records it after the
//! history rewrite and before deleting anything; readers and later runs
//! start each shard at its recorded offset.
//!
//! Progress is tracked by shard identity, never by entry content: two
//! identical entries are two entries.  A missing or unreadable ledger means
//! offset zero everywhere, so the worst case is an entry shown or merged
//! twice, never one dropped.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fsutil::atomic_write;

/// Ledger file name inside the active directory.
pub const LEDGER_FILE_NAME: &str = ".merged.json";

/// Shard file name → bytes of that shard already merged into history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergeLedger(BTreeMap<String, u64>);

impl MergeLedger {
    /// Load the ledger at `path`.  Missing or malformed is empty.
    pub fn load(path: &Path) -> Self {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable merge ledger; ignoring it");
                return Self::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed merge ledger; ignoring it");
                Self::default()
            }
        }
    }

    /// Replace the ledger at `path`.  An empty ledger removes the file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if self.0.is_empty() {
            return match fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        }
        atomic_write(path, &serde_json::to_vec(&self.0)?)
    }

    /// Bytes of `shard` already in history.
    pub fn offset(&self, shard: &Path) -> u64 {
        shard_key(shard)
            .and_then(|key| self.0.get(key))
            .copied()
            .unwrap_or(0)
    }

    pub fn record(&mut self, shard: &Path, offset: u64) {
        if let Some(key) = shard_key(shard) {
            self.0.insert(key.to_string(), offset);
        }
    }

    pub fn forget(&mut self, shard: &Path) {
        if let Some(key) = shard_key(shard) {
            self.0.remove(key);
        }
    }

    /// Drop entries for shards not in `present`.  Returns whether any were.
    pub fn retain_shards(&mut self, present: &[PathBuf]) -> bool {
        let before = self.0.len();
        self.0
            .retain(|name, _| present.iter().any(|p| shard_key(p) == Some(name.as_str())));
        self.0.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn shard_key(shard: &Path) -> Option<&str> {
    shard.file_name().and_then(|name| name.to_str())
}
