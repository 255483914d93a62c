//! Log entry and session identity types.
//!
//! A `LogEntry` is one line of JSONL: an insertion-ordered JSON object with
//! two reserved keys, `timestamp` and `session_id`.  Everything else is
//! caller-defined; the log never inspects it.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GovlogError, GovlogResult};

/// Key under which the entry's ISO-8601 timestamp is stored.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Key under which the owning session id is stored.
pub const SESSION_ID_KEY: &str = "session_id";

/// A single audit log entry.
///
/// Serializes transparently as its JSON object, preserving key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEntry(Map<String, Value>);

impl LogEntry {
    /// Create an empty entry.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap an arbitrary JSON value.  Only objects are accepted.
    pub fn from_value(value: Value) -> GovlogResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(GovlogError::InvalidEntry {
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    /// Parse one JSONL line.
    pub fn from_line(line: &str) -> GovlogResult<Self> {
        let value: Value = serde_json::from_str(line).map_err(|e| GovlogError::InvalidEntry {
            reason: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Encode as a single compact JSON line, without the trailing newline.
    ///
    /// serde_json escapes control characters inside strings, so the result
    /// never contains a raw `\n`.
    pub fn to_line(&self) -> GovlogResult<String> {
        serde_json::to_string(&self.0).map_err(|e| GovlogError::InvalidEntry {
            reason: e.to_string(),
        })
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// The raw `timestamp` string, if present and a string.
    pub fn timestamp(&self) -> Option<&str> {
        self.0.get(TIMESTAMP_KEY).and_then(Value::as_str)
    }

    /// The raw `session_id` string, if present and a string.
    pub fn session_id(&self) -> Option<&str> {
        self.0.get(SESSION_ID_KEY).and_then(Value::as_str)
    }

    /// Set `timestamp` to `now` unless the caller already supplied one.
    pub fn stamp_timestamp(&mut self, now: DateTime<Utc>) {
        if !self.contains_key(TIMESTAMP_KEY) {
            self.insert(TIMESTAMP_KEY, format_timestamp(now));
        }
    }

    /// Set `session_id` unless the caller already supplied one.
    pub fn stamp_session(&mut self, session: &SessionId) {
        if !self.contains_key(SESSION_ID_KEY) {
            self.insert(SESSION_ID_KEY, session.as_str());
        }
    }

    /// The key entries are sorted by.
    pub fn order_key(&self) -> OrderKey {
        let raw = self.timestamp().unwrap_or("");
        match parse_instant(raw) {
            Some(instant) => OrderKey(instant.format(ORDER_KEY_FORMAT).to_string()),
            None => OrderKey(raw.to_string()),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for LogEntry {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Chronological ordering key for a `LogEntry`.
///
/// A timestamp that parses as ISO-8601 becomes its instant written as
/// fixed-width UTC, so `+02:00`, `Z` and naive forms interleave correctly.
/// Anything else keeps its raw text and compares lexically against those
/// normalised keys.  A missing timestamp is the empty string and sorts
/// first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey(String);

impl OrderKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const ORDER_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// ISO-8601 forms without an offset.  These are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y%m%dT%H%M%S%.f",
];

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw
        .strip_suffix('Z')
        .or_else(|| raw.strip_suffix('z'))
        .unwrap_or(raw);
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Render a timestamp the way the log stamps it: RFC 3339, microseconds, `Z`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Session identity ──────────────────────────────────────────────────────────

/// Identifier for one logical run of a calling process.
///
/// Eight ASCII alphanumeric characters.  Not globally unique; combined with
/// the shard's creation timestamp it is unique enough to avoid filename
/// collisions between concurrently starting sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Required length of every session id.
    pub const LEN: usize = 8;

    /// Generate a fresh id from the first 8 hex digits of a random UUID.
    pub fn generate() -> Self {
        let mut simple = uuid::Uuid::new_v4().simple().to_string();
        simple.truncate(Self::LEN);
        Self(simple)
    }

    /// Validate and wrap an existing id.
    pub fn parse(value: &str) -> GovlogResult<Self> {
        if Self::is_valid(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(GovlogError::InvalidSessionId {
                value: value.to_string(),
            })
        }
    }

    pub fn is_valid(value: &str) -> bool {
        value.len() == Self::LEN && value.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = GovlogError;

    fn try_from(value: String) -> GovlogResult<Self> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
