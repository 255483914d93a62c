//! `govlog init`: repository setup for the sharded log.
//!
//! Every step is idempotent.  Running `init` twice leaves the second run
//! with nothing in `created` or `updated`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use govlog_contracts::{GovlogError, GovlogResult};
use govlog_core::LogLayout;

/// Git hook that triggers consolidation.
pub const HOOK_NAME: &str = "post-commit";

/// Command the hook runs.  Also how an existing hook is recognised.
pub const HOOK_COMMAND: &str = "govlog consolidate --hook";

const KEEP_FILE: &str = ".gitkeep";

/// Files touched by one `init` run.
#[derive(Debug, Default)]
pub struct InitReport {
    pub created: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
}

impl InitReport {
    pub fn is_unchanged(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }
}

/// Run every setup step for the repository `layout` describes.
pub fn init(layout: &LogLayout) -> GovlogResult<InitReport> {
    let mut report = InitReport::default();
    ensure_ignore_rules(layout, &mut report)?;
    ensure_keep_file(layout, &mut report)?;
    let hooks = hooks_dir(layout.repo_root())?;
    install_hook(&hooks, &mut report)?;
    Ok(report)
}

/// The two lines that keep shards out of commits while still tracking the
/// (otherwise empty) active directory.
pub fn ignore_rules(layout: &LogLayout) -> [String; 2] {
    let active = layout
        .active_dir()
        .strip_prefix(layout.logs_dir())
        .unwrap_or(layout.active_dir())
        .to_string_lossy()
        .replace('\\', "/");
    [format!("{active}/*"), format!("!{active}/{KEEP_FILE}")]
}

/// Append any missing rule to `<logs_dir>/.gitignore`.
pub fn ensure_ignore_rules(layout: &LogLayout, report: &mut InitReport) -> GovlogResult<()> {
    let path = layout.logs_dir().join(".gitignore");
    let existing = match fs::read_to_string(&path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(io_error(&path, e)),
    };

    let current = existing.as_deref().unwrap_or("");
    let missing: Vec<String> = ignore_rules(layout)
        .into_iter()
        .filter(|rule| !current.lines().any(|l| l.trim() == rule))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let mut text = current.to_string();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    for rule in &missing {
        text.push_str(rule);
        text.push('\n');
    }

    fs::create_dir_all(layout.logs_dir()).map_err(|e| io_error(layout.logs_dir(), e))?;
    fs::write(&path, text).map_err(|e| io_error(&path, e))?;

    if existing.is_some() {
        report.updated.push(path);
    } else {
        report.created.push(path);
    }
    Ok(())
}

/// Create the active directory and its `.gitkeep`.
pub fn ensure_keep_file(layout: &LogLayout, report: &mut InitReport) -> GovlogResult<()> {
    let path = layout.active_dir().join(KEEP_FILE);
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(layout.active_dir()).map_err(|e| io_error(layout.active_dir(), e))?;
    fs::write(&path, "").map_err(|e| io_error(&path, e))?;
    report.created.push(path);
    Ok(())
}

/// Ask git where hooks live.  Honours `core.hooksPath` and linked worktrees.
pub fn hooks_dir(repo_root: &Path) -> GovlogResult<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--git-path", "hooks"])
        .current_dir(repo_root)
        .output()
        .map_err(|e| GovlogError::NotARepository {
            path: repo_root.display().to_string(),
            reason: format!("failed to run git: {e}"),
        })?;

    if !output.status.success() {
        return Err(GovlogError::NotARepository {
            path: repo_root.display().to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let dir = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
    Ok(if dir.is_absolute() {
        dir
    } else {
        repo_root.join(dir)
    })
}

/// Install or extend the `post-commit` hook in `hooks_dir`.
///
/// A hook that already mentions `HOOK_COMMAND` is left alone.  Any other
/// existing hook gets the command appended, so whatever it already does
/// keeps running.
pub fn install_hook(hooks_dir: &Path, report: &mut InitReport) -> GovlogResult<()> {
    let path = hooks_dir.join(HOOK_NAME);
    let line = format!("{HOOK_COMMAND} || true\n");

    match fs::read_to_string(&path) {
        Ok(existing) if existing.contains(HOOK_COMMAND) => return Ok(()),
        Ok(existing) => {
            let mut text = existing;
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&line);
            fs::write(&path, text).map_err(|e| io_error(&path, e))?;
            report.updated.push(path.clone());
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(hooks_dir).map_err(|e| io_error(hooks_dir, e))?;
            let text = format!("#!/bin/sh\n# Merge governance audit shards into history.\n{line}");
            fs::write(&path, text).map_err(|e| io_error(&path, e))?;
            report.created.push(path.clone());
        }
        Err(e) => return Err(io_error(&path, e)),
    }

    make_executable(&path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> GovlogResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .map_err(|e| io_error(path, e))?
        .permissions();
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms).map_err(|e| io_error(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> GovlogResult<()> {
    Ok(())
}

fn io_error(path: &Path, e: io::Error) -> GovlogError {
    GovlogError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}
