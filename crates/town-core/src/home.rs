//! Home directory resolution
//!
//! `TOWN_HOME` (trimmed, non-empty) wins over the platform home. Tests and
//! sandboxed deployments set it so the global config lives in a scratch
//! directory.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "TOWN_HOME";

/// Home directory for town state and global config.
///
/// # Errors
///
/// Fails when `TOWN_HOME` is unset or blank and the platform has no home.
pub fn get_home_dir() -> Result<PathBuf> {
    std::env::var(HOME_ENV)
        .ok()
        .map(|home| home.trim().to_string())
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .context("Could not determine home directory")
}

/// Directory holding the global config file (`<home>/.config/town`).
pub fn global_config_dir(home: &std::path::Path) -> PathBuf {
    home.join(".config").join("town")
}
