//! # govlog-consolidate
//!
//! Merges per-session shards back into the canonical history file.
//!
//! Run by a post-commit hook or by hand.  Each run takes the consolidation
//! lock, merges history with every readable shard, atomically replaces the
//! history, records how much of each shard it merged, and only then deletes
//! the shards it merged.  Running it again with nothing pending is a no-op.
//!
//! ## Limits
//!
//! Session writers never lock.  A shard that grows while it is being merged
//! is kept for the next run, but an append that lands between the final
//! length check and the delete is lost with the shard.  The window is one
//! `stat` call wide; see `remove_if_unchanged` in `consolidator.rs`.
//!
//! A crash after the history rewrite and before the shard deletes makes the
//! next run merge those shards again: entries can be duplicated there,
//! never dropped.  Readers that land in the same window may count a
//! merged shard twice until the delete goes through.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use govlog_consolidate::Consolidator;
//!
//! let result = Consolidator::discover()?.consolidate()?;
//! println!("merged {} entries from {} shards", result.entries_merged, result.shards_merged);
//! ```

pub mod consolidator;
pub mod lock;

pub use consolidator::Consolidator;
pub use lock::ConsolidationLock;

// ── Tests ─────────────────────────────────────────────────────────────────────
