//! Git-backed repository root resolution.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use govlog_contracts::{GovlogError, GovlogResult};

use crate::traits::RootResolver;

/// Asks git for the top-level directory of the working tree.
///
/// `git rev-parse --show-toplevel` returns a linked worktree's own root,
/// not the main checkout's, so sessions in different worktrees keep
/// separate logs.
#[derive(Debug, Clone, Default)]
pub struct GitRootResolver {
    /// Directory to run git in.  `None` means the process working directory.
    cwd: Option<PathBuf>,
}

impl GitRootResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative to `dir` instead of the process working directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(dir.into()),
        }
    }

    fn display_dir(&self) -> String {
        match &self.cwd {
            Some(dir) => dir.display().to_string(),
            None => std::env::current_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|_| ".".to_string()),
        }
    }
}

impl RootResolver for GitRootResolver {
    fn resolve(&self) -> GovlogResult<PathBuf> {
        let mut cmd = Command::new("git");
        cmd.args(["rev-parse", "--show-toplevel"]);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| GovlogError::NotARepository {
            path: self.display_dir(),
            reason: format!("failed to run git: {e}"),
        })?;

        if !output.status.success() {
            return Err(GovlogError::NotARepository {
                path: self.display_dir(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if root.is_empty() {
            return Err(GovlogError::NotARepository {
                path: self.display_dir(),
                reason: "git reported an empty top-level directory".to_string(),
            });
        }

        debug!(root = %root, "resolved repository root");
        Ok(Path::new(&root).to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git_init(dir: &Path) {
        let status = Command::new("git")
            .args(["init", "--quiet"])
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_resolves_root_from_subdirectory() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let root = GitRootResolver::in_dir(&nested).resolve().unwrap();

        assert_eq!(
            root.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_outside_repository_is_not_a_repository() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();

        match GitRootResolver::in_dir(dir.path()).resolve() {
            // TMPDIR itself lives inside a checkout; nothing to assert.
            Ok(_) => {}
            Err(GovlogError::NotARepository { path, reason }) => {
                assert_eq!(path, dir.path().display().to_string());
                assert!(!reason.is_empty());
            }
            other => panic!("expected NotARepository, got {:?}", other),
        }
    }
}
