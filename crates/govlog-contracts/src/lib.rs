//! # govlog-contracts
//!
//! Shared types, configuration schema, and errors for the govlog
//! session-sharded audit log.
//!
//! All crates in the workspace import from here. No I/O lives in this
//! crate, only data definitions and error types.

pub mod config;
pub mod entry;
pub mod error;
pub mod report;

pub use config::LogConfig;
pub use entry::{LogEntry, OrderKey, SessionId, SESSION_ID_KEY, TIMESTAMP_KEY};
pub use error::{GovlogError, GovlogResult};
pub use report::{ConsolidationResult, ReadReport, SkippedSource, SourceOutcome};

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    // ── LogEntry ─────────────────────────────────────────────────────────────

    #[test]
    fn entry_from_value_rejects_non_objects() {
        for value in [json!(null), json!(3), json!("x"), json!([1, 2])] {
            match LogEntry::from_value(value) {
                Err(GovlogError::InvalidEntry { reason }) => {
                    assert!(reason.contains("expected a JSON object"), "{reason}");
                }
                other => panic!("expected InvalidEntry, got {:?}", other),
            }
        }
    }

    #[test]
    fn entry_line_preserves_key_order_and_has_no_newline() {
        let entry = LogEntry::new()
            .with("zeta", 1)
            .with("alpha", "multi\nline")
            .with("mid", json!({"nested": true}));

        let line = entry.to_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.find("zeta").unwrap() < line.find("alpha").unwrap());

        let decoded = LogEntry::from_line(&line).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.get("alpha"), Some(&json!("multi\nline")));
    }

    #[test]
    fn entry_stamping_keeps_caller_values() {
        let session = SessionId::parse("aaaa1111").unwrap();
        let now = Utc.with_ymd_and_hms(2026, 1, 24, 18, 30, 45).unwrap();

        let mut stamped = LogEntry::new().with("event", "start");
        stamped.stamp_timestamp(now);
        stamped.stamp_session(&session);
        assert_eq!(stamped.timestamp(), Some("2026-01-24T18:30:45.000000Z"));
        assert_eq!(stamped.session_id(), Some("aaaa1111"));

        let mut supplied = LogEntry::new()
            .with(TIMESTAMP_KEY, "2020-01-01T00:00:00Z")
            .with(SESSION_ID_KEY, "caller01");
        supplied.stamp_timestamp(now);
        supplied.stamp_session(&session);
        assert_eq!(supplied.timestamp(), Some("2020-01-01T00:00:00Z"));
        assert_eq!(supplied.session_id(), Some("caller01"));
    }

    #[test]
    fn order_key_compares_instants_across_offsets() {
        let utc = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24T10:00:00Z");
        let plus_two = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24T11:30:00+02:00");
        let later = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24T10:00:00.000001Z");

        // 11:30+02:00 is 09:30Z, earlier than 10:00Z despite sorting later lexically.
        assert!(plus_two.order_key() < utc.order_key());
        assert!(utc.order_key() < later.order_key());

        let same_instant = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24T12:00:00+02:00");
        assert_eq!(utc.order_key(), same_instant.order_key());
    }

    #[test]
    fn order_key_missing_timestamp_sorts_first() {
        let missing = LogEntry::new().with("event", "no-ts");
        let valid = LogEntry::new().with(TIMESTAMP_KEY, "1999-01-01T00:00:00Z");
        assert!(missing.order_key() < valid.order_key());
        assert_eq!(missing.order_key().as_str(), "");
    }

    #[test]
    fn order_key_reads_naive_and_basic_iso8601_as_utc() {
        let stamped_1999 = LogEntry::new().with(TIMESTAMP_KEY, "1999-01-01T00:00:00.000000Z");
        let naive_2026 = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24T18:30:45");
        let before = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24T18:30:44Z");
        let basic = LogEntry::new().with(TIMESTAMP_KEY, "20260124T183045.5Z");
        let after = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24T18:30:46+00:00");

        assert!(stamped_1999.order_key() < naive_2026.order_key());
        assert!(before.order_key() < naive_2026.order_key());
        assert!(naive_2026.order_key() < basic.order_key());
        assert!(basic.order_key() < after.order_key());

        let naive_with_z = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24T18:30:45Z");
        assert_eq!(naive_2026.order_key(), naive_with_z.order_key());
    }

    #[test]
    fn order_key_unparseable_compares_lexically() {
        let garbage = LogEntry::new().with(TIMESTAMP_KEY, "yesterday");
        let date_only = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24");
        let early = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-23T23:00:00Z");
        let late = LogEntry::new().with(TIMESTAMP_KEY, "2026-01-24T01:00:00Z");

        assert!(early.order_key() < date_only.order_key());
        assert!(date_only.order_key() < late.order_key());
        assert!(late.order_key() < garbage.order_key());
    }

    // ── SessionId ────────────────────────────────────────────────────────────

    #[test]
    fn session_id_generate_is_valid_and_varies() {
        let ids: std::collections::HashSet<String> = (0..100)
            .map(|_| SessionId::generate().to_string())
            .collect();

        assert!(ids.iter().all(|id| SessionId::is_valid(id)));
        // 32 bits of randomness; 100 draws colliding would mean a broken RNG.
        assert!(ids.len() > 95);
    }

    #[test]
    fn session_id_parse_validates() {
        assert!(SessionId::parse("bbbb2222").is_ok());
        for bad in ["", "short", "toolong123", "bad/char", "ünicode1"] {
            match SessionId::parse(bad) {
                Err(GovlogError::InvalidSessionId { value }) => assert_eq!(value, bad),
                other => panic!("expected InvalidSessionId for {bad:?}, got {:?}", other),
            }
        }
    }

    #[test]
    fn session_id_deserialize_validates() {
        let ok: SessionId = serde_json::from_str("\"a1b2c3d4\"").unwrap();
        assert_eq!(ok.as_str(), "a1b2c3d4");
        assert!(serde_json::from_str::<SessionId>("\"nope\"").is_err());
    }

    // ── LogConfig ────────────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.logs_dir, "logs");
        assert_eq!(config.active_dir, "active");
        assert_eq!(config.history_file, "governance_history.jsonl");
    }

    #[test]
    fn config_partial_json_fills_defaults() {
        let config: LogConfig = serde_json::from_str(r#"{"logs_dir": "audit"}"#).unwrap();
        assert_eq!(config.logs_dir, "audit");
        assert_eq!(config.active_dir, "active");
    }

    // ── Error display messages ───────────────────────────────────────────────

    #[test]
    fn error_shard_write_failed_display() {
        let err = GovlogError::ShardWriteFailed {
            path: "logs/active/x.jsonl".to_string(),
            reason: "read-only file system".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("shard write failed"));
        assert!(msg.contains("logs/active/x.jsonl"));
        assert!(msg.contains("read-only file system"));
    }

    #[test]
    fn error_history_corrupt_display() {
        let err = GovlogError::HistoryCorrupt {
            path: "logs/governance_history.jsonl".to_string(),
            line: 7,
            reason: "expected value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("corrupt at line 7"));
    }

    #[test]
    fn consolidation_result_noop() {
        assert!(ConsolidationResult::default().is_noop());
        let merged = ConsolidationResult {
            shards_merged: 2,
            ..Default::default()
        };
        assert!(!merged.is_noop());
    }
}
