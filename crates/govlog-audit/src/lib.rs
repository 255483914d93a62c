//! # govlog-audit
//!
//! Session-sharded, append-only governance audit log.
//!
//! ## Overview
//!
//! Many agent sessions run concurrently in one checkout, usually as separate
//! processes.  Each creates one `GovernanceAuditLog`, which owns one shard
//! file; nobody else ever writes to it, so sessions need no shared lock.
//! Reads merge the consolidated history with every shard still pending, so
//! an entry is visible the moment `log()` returns.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use govlog_audit::GovernanceAuditLog;
//! use govlog_contracts::LogEntry;
//!
//! let audit = GovernanceAuditLog::discover()?;
//! audit.log(LogEntry::new().with("event", "node_start").with("node", "draft"))?;
//!
//! for entry in audit.tail(10) {
//!     println!("{}", entry.to_line()?);
//! }
//! ```

pub mod log;

pub use log::{GovernanceAuditLog, LogMode};

// ── Tests ─────────────────────────────────────────────────────────────────────
