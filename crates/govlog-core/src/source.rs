//! JSONL source readers.
//!
//! Every reader here is fail-open: it never returns `Err`.  A file that is
//! missing yields `SourceOutcome::Missing`; a file that cannot be opened, is
//! not UTF-8, or holds a malformed non-blank line yields
//! `SourceOutcome::Skipped` and a `warn!` event.  Skips are per source and
//! per call: the next read tries again.
//!
//! Skipping the whole source (instead of just the bad line) keeps a
//! half-written shard out of consolidation, so it is never merged and
//! deleted while its owner may still be completing the line.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, warn};

use govlog_contracts::{LogEntry, ReadReport, SkippedSource, SourceOutcome};

/// A malformed line inside a JSONL document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number within the parsed text.
    pub line: usize,
    pub reason: String,
}

/// Parse JSONL text.  Blank lines are ignored; the first malformed line
/// aborts the parse.
pub fn parse_jsonl(text: &str) -> Result<Vec<LogEntry>, LineError> {
    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry = LogEntry::from_line(line).map_err(|e| LineError {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Read every entry of `path`.
pub fn read_source(path: &Path) -> SourceOutcome {
    read_source_from(path, 0)
}

/// Read the entries of `path` past byte `offset`.
///
/// `offset` is a merge ledger position, so it falls on a line boundary.
/// An offset past the end means the file is not the one the ledger saw;
/// it is then read from the start.
pub fn read_source_from(path: &Path, offset: u64) -> SourceOutcome {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return SourceOutcome::Missing,
        Err(e) => return skipped(path, format!("unreadable: {e}")),
    };

    let text = match std::str::from_utf8(unmerged(&bytes, offset)) {
        Ok(text) => text,
        Err(e) => return skipped(path, format!("not UTF-8: {e}")),
    };

    match parse_jsonl(text) {
        Ok(entries) => {
            debug!(path = %path.display(), offset, entries = entries.len(), "read source");
            SourceOutcome::Loaded(entries)
        }
        Err(e) => skipped(path, format!("malformed line {}: {}", e.line, e.reason)),
    }
}

/// The part of `bytes` after `offset`, or all of it if `offset` is past
/// the end.
pub fn unmerged(bytes: &[u8], offset: u64) -> &[u8] {
    match usize::try_from(offset) {
        Ok(start) if start <= bytes.len() => &bytes[start..],
        _ => bytes,
    }
}

/// Read the last `n` entries of `path` without loading the whole file.
///
/// The first window is `n * line_bytes_estimate` bytes from the end.  If
/// it holds fewer than `n` complete lines it doubles until it does or it
/// covers the file.  The first line of a window that does not start at
/// offset 0 may be cut off and is discarded.  `n == 0` reads everything.
pub fn read_suffix(path: &Path, n: usize, line_bytes_estimate: u64) -> SourceOutcome {
    if n == 0 {
        return read_source(path);
    }

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return SourceOutcome::Missing,
        Err(e) => return skipped(path, format!("unreadable: {e}")),
    };

    // Length is taken once from the open handle.  An atomic replace of the
    // file during the read does not affect this handle.
    let len = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(e) => return skipped(path, format!("unreadable: {e}")),
    };

    let estimate = line_bytes_estimate.max(1);
    let mut window = (n as u64).saturating_mul(estimate);

    loop {
        let start = len.saturating_sub(window);
        let bytes = match read_range(&mut file, start, len - start) {
            Ok(bytes) => bytes,
            Err(e) => return skipped(path, format!("unreadable: {e}")),
        };

        let body = if start == 0 {
            &bytes[..]
        } else {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(pos) => &bytes[pos + 1..],
                None => &[][..],
            }
        };

        let text = match std::str::from_utf8(body) {
            Ok(text) => text,
            Err(e) => return skipped(path, format!("not UTF-8: {e}")),
        };

        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

        if lines.len() >= n || start == 0 {
            let tail = &lines[lines.len().saturating_sub(n)..];
            let mut entries = Vec::with_capacity(tail.len());
            for line in tail {
                match LogEntry::from_line(line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => return skipped(path, format!("malformed line in tail: {e}")),
                }
            }
            debug!(
                path = %path.display(),
                window_bytes = len - start,
                entries = entries.len(),
                "read source suffix"
            );
            return SourceOutcome::Loaded(entries);
        }

        window = window.saturating_mul(2);
    }
}

fn read_range(file: &mut File, start: u64, len: u64) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity(len as usize);
    file.by_ref().take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

fn skipped(path: &Path, reason: String) -> SourceOutcome {
    warn!(path = %path.display(), reason = %reason, "skipping unreadable log source");
    SourceOutcome::Skipped(SkippedSource {
        path: path.to_path_buf(),
        reason,
    })
}

/// Fold one source outcome into a report.
pub fn absorb(report: &mut ReadReport, outcome: SourceOutcome) {
    match outcome {
        SourceOutcome::Loaded(entries) => report.entries.extend(entries),
        SourceOutcome::Missing => {}
        SourceOutcome::Skipped(skip) => report.skipped.push(skip),
    }
}

/// Stable-sort entries by timestamp.
///
/// Entries with equal keys keep their relative order, so callers control
/// tie-breaking by the order they concatenate sources in.
pub fn sort_chronological(entries: &mut [LogEntry]) {
    entries.sort_by_cached_key(LogEntry::order_key);
}

/// Keep only the last `n` entries.  `n == 0` keeps everything.
pub fn keep_last(entries: &mut Vec<LogEntry>, n: usize) {
    if n > 0 && entries.len() > n {
        entries.drain(..entries.len() - n);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn line(ts: &str, n: u32) -> String {
        format!(r#"{{"timestamp":"{ts}","n":{n}}}"#)
    }

    fn write_lines(path: &Path, count: u32) {
        let body: String = (0..count)
            .map(|i| line(&format!("2026-01-01T00:00:{:02}Z", i % 60), i) + "\n")
            .collect();
        fs::write(path, body).unwrap();
    }

    fn numbers(outcome: SourceOutcome) -> Vec<u64> {
        match outcome {
            SourceOutcome::Loaded(entries) => entries
                .iter()
                .map(|e| e.get("n").unwrap().as_u64().unwrap())
                .collect(),
            other => panic!("expected Loaded, got {:?}", other),
        }
    }

    #[test]
    fn test_read_source_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_source(&dir.path().join("absent.jsonl")),
            SourceOutcome::Missing
        ));
    }

    #[test]
    fn test_read_source_ignores_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        fs::write(&path, format!("{}\n\n   \n{}\n", line("a", 1), line("b", 2))).unwrap();

        assert_eq!(numbers(read_source(&path)), vec![1, 2]);
    }

    #[test]
    fn test_read_source_torn_trailing_line_skips_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        fs::write(&path, format!("{}\n{{\"timestamp\":\"2026", line("a", 1))).unwrap();

        match read_source(&path) {
            SourceOutcome::Skipped(skip) => {
                assert_eq!(skip.path, path);
                assert!(skip.reason.contains("malformed line 2"), "{}", skip.reason);
            }
            other => panic!("expected Skipped, got {:?}", other),
        }
    }

    #[test]
    fn test_read_source_non_object_line_skips_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        fs::write(&path, "[1,2,3]\n").unwrap();
        assert!(matches!(read_source(&path), SourceOutcome::Skipped(_)));
    }

    #[test]
    fn test_read_source_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_source(dir.path()), SourceOutcome::Skipped(_)));
    }

    #[test]
    fn test_read_source_from_skips_merged_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        let first = format!("{}\n", line("a", 1));
        fs::write(&path, format!("{first}{}\n", line("b", 2))).unwrap();

        assert_eq!(numbers(read_source_from(&path, first.len() as u64)), vec![2]);
        assert_eq!(numbers(read_source_from(&path, 0)), vec![1, 2]);
    }

    #[test]
    fn test_read_source_from_offset_past_end_reads_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        fs::write(&path, format!("{}\n", line("a", 1))).unwrap();

        assert_eq!(numbers(read_source_from(&path, 10_000)), vec![1]);
    }

    #[test]
    fn test_read_source_from_ignores_corruption_before_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.jsonl");
        let bad = "not json\n";
        fs::write(&path, format!("{bad}{}\n", line("a", 1))).unwrap();

        assert_eq!(numbers(read_source_from(&path, bad.len() as u64)), vec![1]);
        assert!(matches!(read_source(&path), SourceOutcome::Skipped(_)));
    }

    #[test]
    fn test_read_suffix_returns_last_n() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        write_lines(&path, 200);

        assert_eq!(numbers(read_suffix(&path, 3, 512)), vec![197, 198, 199]);
    }

    #[test]
    fn test_read_suffix_grows_small_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        write_lines(&path, 200);

        // Each line is ~40 bytes; a 1-byte estimate forces several doublings.
        assert_eq!(numbers(read_suffix(&path, 5, 1)), vec![195, 196, 197, 198, 199]);
    }

    #[test]
    fn test_read_suffix_more_than_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        write_lines(&path, 4);

        assert_eq!(numbers(read_suffix(&path, 10, 1)), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_read_suffix_zero_reads_all() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        write_lines(&path, 7);

        assert_eq!(numbers(read_suffix(&path, 0, 512)).len(), 7);
    }

    #[test]
    fn test_read_suffix_ignores_corruption_outside_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.jsonl");
        let mut body = String::from("garbage that is not json\n");
        for i in 0..50 {
            body.push_str(&line("2026-01-01T00:00:00Z", i));
            body.push('\n');
        }
        fs::write(&path, body).unwrap();

        assert_eq!(numbers(read_suffix(&path, 2, 64)), vec![48, 49]);
        assert!(matches!(read_source(&path), SourceOutcome::Skipped(_)));
    }

    #[test]
    fn test_sort_is_stable_for_equal_timestamps() {
        let mut entries: Vec<LogEntry> = [
            ("2026-01-01T00:00:02Z", 0),
            ("2026-01-01T00:00:01Z", 1),
            ("2026-01-01T00:00:02Z", 2),
            ("2026-01-01T00:00:01Z", 3),
        ]
        .iter()
        .map(|(ts, n)| LogEntry::from_line(&line(ts, *n)).unwrap())
        .collect();

        sort_chronological(&mut entries);

        let order: Vec<u64> = entries
            .iter()
            .map(|e| e.get("n").unwrap().as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_keep_last() {
        let mut entries: Vec<LogEntry> = (0..5)
            .map(|i| LogEntry::new().with("n", i))
            .collect();
        keep_last(&mut entries, 2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].get("n").unwrap(), 3);

        keep_last(&mut entries, 0);
        assert_eq!(entries.len(), 2);
    }
}
