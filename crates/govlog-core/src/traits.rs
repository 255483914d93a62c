//! Seams between govlog and its environment.
//!
//! The repository root is an explicit input everywhere.  Code that needs
//! one either takes a `PathBuf` directly or asks a `RootResolver` once at
//! construction, so tests never have to change the process working
//! directory.

use std::path::PathBuf;

use govlog_contracts::GovlogResult;

/// Locates the root every govlog path is relative to.
pub trait RootResolver: Send + Sync {
    /// Return the absolute root directory.
    ///
    /// Fails with `GovlogError::NotARepository` when there is none.
    fn resolve(&self) -> GovlogResult<PathBuf>;
}

/// A resolver that always returns the same, already-known root.
#[derive(Debug, Clone)]
pub struct StaticRoot(pub PathBuf);

impl RootResolver for StaticRoot {
    fn resolve(&self) -> GovlogResult<PathBuf> {
        Ok(self.0.clone())
    }
}
