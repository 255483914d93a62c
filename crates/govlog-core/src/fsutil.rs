//! Filesystem primitives for crash-safe writes.
//!
//! Two write shapes exist in govlog:
//!
//! - **Replace**: `atomic_write` stages the full content in a temp file in
//!   the target's own directory, syncs it, and renames it over the target.
//!   Readers see the old file or the new one, never a mix.
//! - **Append**: `append_line` opens, appends one complete line with a
//!   single `write_all`, flushes, and closes.  A crash loses at most the
//!   line in flight; earlier lines are never touched.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Prefix of staging files created by `atomic_write`.
///
/// Shard enumeration ignores anything that does not match the shard name
/// pattern, so an orphaned staging file never looks like a shard.
pub const TEMP_PREFIX: &str = ".govlog-";

/// Replace `target` with `content` atomically.
///
/// The temp file is created next to `target` so the rename never crosses a
/// filesystem boundary.  On any failure before the rename the temp file is
/// removed (when the `NamedTempFile` drops) and `target` is left untouched.
pub fn atomic_write(target: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut staged = Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    staged.write_all(content)?;
    staged.flush()?;
    staged.as_file().sync_all()?;
    staged.persist(target).map_err(|e| e.error)?;

    sync_dir(dir);
    Ok(())
}

/// Append `line` plus a newline to `path`, creating the file if needed.
///
/// `line` must not itself contain a newline.
pub fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf.as_bytes())?;
    file.flush()
}

/// Best-effort fsync of a directory so a completed rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Byte length of `path`, or `None` if it cannot be stat'ed.
pub fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}
