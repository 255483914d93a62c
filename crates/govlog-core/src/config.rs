//! Loading `govlog.toml`.
//!
//! The file is optional.  When present it is parsed strictly: unknown keys
//! and paths that would leave the repository are configuration errors, not
//! silently ignored.

use std::path::{Component, Path};

use tracing::debug;

use govlog_contracts::{GovlogError, GovlogResult, LogConfig};

/// Parse `s` as a TOML `LogConfig` and validate it.
pub fn from_toml_str(s: &str) -> GovlogResult<LogConfig> {
    let config: LogConfig = toml::from_str(s).map_err(|e| GovlogError::ConfigError {
        reason: format!("failed to parse govlog TOML: {}", e),
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Read and parse the config file at `path`.
pub fn from_file(path: &Path) -> GovlogResult<LogConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| GovlogError::ConfigError {
        reason: format!("failed to read config file '{}': {}", path.display(), e),
    })?;
    from_toml_str(&contents)
}

/// Load `<repo_root>/govlog.toml`, or the defaults if it does not exist.
pub fn load_config(repo_root: &Path) -> GovlogResult<LogConfig> {
    let path = repo_root.join(LogConfig::FILE_NAME);
    if path.is_file() {
        debug!(path = %path.display(), "loading govlog config");
        from_file(&path)
    } else {
        Ok(LogConfig::default())
    }
}

/// Reject configured paths that are empty, absolute, or contain `..`.
pub fn validate_config(config: &LogConfig) -> GovlogResult<()> {
    check_relative("logs_dir", &config.logs_dir)?;
    check_relative("active_dir", &config.active_dir)?;
    check_relative("history_file", &config.history_file)?;

    if config.tail_line_bytes_estimate == 0 {
        return Err(GovlogError::ConfigError {
            reason: "tail_line_bytes_estimate must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn check_relative(key: &str, value: &str) -> GovlogResult<()> {
    let escapes = Path::new(value)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

    if value.trim().is_empty() || escapes {
        return Err(GovlogError::ConfigError {
            reason: format!("{key} must be a relative path inside the repository, got '{value}'"),
        });
    }
    Ok(())
}
