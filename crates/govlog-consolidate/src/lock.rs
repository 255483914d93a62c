//! Advisory lock serializing consolidation runs.
//!
//! Uses `flock(2)` on Unix (`LockFileEx` on Windows) via the `fs2` crate.
//! The OS drops the lock when the holding process exits or crashes, so a
//! leftover lock file is harmless and needs no stale-lock detection.
//!
//! Only consolidations take this lock.  Session writers never do.
//!
//! Only contention is waited out.  Any other locking error is returned at
//! once as `Io`.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use govlog_contracts::{GovlogError, GovlogResult};

/// An exclusive consolidation lock, released on drop.
pub struct ConsolidationLock {
    _file: File,
}

impl ConsolidationLock {
    /// Acquire the lock at `path`, polling until `timeout` elapses.
    ///
    /// Returns `ConsolidationLocked` if another holder keeps it that long.
    pub fn acquire(path: &Path, timeout: Duration) -> GovlogResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| GovlogError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let start = Instant::now();
        let poll_interval = Duration::from_millis(10);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "consolidation lock acquired");
                    return Ok(Self { _file: file });
                }
                Err(e) if !is_contended(&e) => {
                    return Err(GovlogError::Io {
                        path: path.display().to_string(),
                        reason: format!("cannot lock: {e}"),
                    });
                }
                Err(_) if start.elapsed() >= timeout => {
                    return Err(GovlogError::ConsolidationLocked {
                        path: path.display().to_string(),
                        waited_ms: start.elapsed().as_millis() as u64,
                    });
                }
                Err(_) => std::thread::sleep(poll_interval),
            }
        }
    }
}

/// Whether a failed `try_lock_exclusive` means another holder, as opposed
/// to a filesystem that cannot lock at all (`ENOLCK` on some NFS mounts).
fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
