//! # govlog-core
//!
//! Filesystem building blocks shared by the audit log facade and the
//! consolidator.
//!
//! This crate provides:
//! - `RootResolver` and its git-backed implementation
//! - `atomic_write` / `append_line`, the only two ways govlog writes files
//! - `LogLayout`, which knows where history and shards live and how shards
//!   are named
//! - `MergeLedger`, how much of each pending shard history already holds
//! - fail-open JSONL readers (`read_source`, `read_suffix`) and the
//!   chronological merge
//! - `govlog.toml` loading
//!
//! ## Usage
//!
//! ```rust,ignore
//! use govlog_core::{config::load_config, GitRootResolver, LogLayout, RootResolver};
//!
//! let root = GitRootResolver::new().resolve()?;
//! let layout = LogLayout::new(&root, &load_config(&root)?)?;
//! for shard in layout.list_shards()? {
//!     println!("{}", shard.display());
//! }
//! ```

pub mod config;
pub mod fsutil;
pub mod layout;
pub mod ledger;
pub mod repo;
pub mod source;
pub mod traits;

pub use fsutil::{append_line, atomic_write};
pub use layout::LogLayout;
pub use ledger::MergeLedger;
pub use repo::GitRootResolver;
pub use traits::{RootResolver, StaticRoot};
