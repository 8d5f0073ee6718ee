//! Configuration discovery and loading.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

use super::schema::ReleaseConfig;

/// Configuration file names to search for, in order of priority.
const CONFIG_FILES: &[&str] = &["herald.toml", ".herald.toml", ".config/herald.toml"];

/// Find the configuration file starting from a directory and walking up.
///
/// The walk stops at `repo_root`; files above the repository are never read.
/// A `start_dir` outside `repo_root` is searched on its own.
pub fn find_config_file_from(start_dir: &Path, repo_root: &Path) -> Option<PathBuf> {
    for dir in start_dir.ancestors() {
        if let Some(path) = CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
        {
            return Some(path);
        }
        if dir == repo_root || !dir.starts_with(repo_root) {
            break;
        }
    }
    None
}

/// Load configuration for a repository, falling back to defaults.
///
/// Searches from `start_dir` up to the repository root.
pub fn load_config(start_dir: &Path, repo_root: &Path) -> Result<ReleaseConfig, ConfigError> {
    match find_config_file_from(start_dir, repo_root) {
        Some(path) => load_config_from(&path),
        None => {
            debug!("No configuration file found, using defaults");
            Ok(ReleaseConfig::default())
        }
    }
}

/// Load configuration from a specific path.
pub fn load_config_from(path: &Path) -> Result<ReleaseConfig, ConfigError> {
    debug!(path = %path.display(), "Loading configuration");

    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<ReleaseConfig, ConfigError> {
    let config: ReleaseConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
