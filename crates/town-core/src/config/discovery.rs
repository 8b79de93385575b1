//! Configuration discovery and resolution

use super::types::Config;
use crate::registry::RegistryError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Town-local config file name, found by walking up from the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".town.toml";

/// Environment variable overriding the town root.
pub const TOWN_ROOT_ENV: &str = "TOWN_ROOT";

/// Environment variable overriding the identity.
pub const TOWN_IDENTITY_ENV: &str = "TOWN_IDENTITY";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// `[[rigs]]` bindings conflict or are invalid
    #[error("invalid rig binding: {0}")]
    Registry(#[from] RegistryError),
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub town_root: Option<PathBuf>,
    pub identity: Option<String>,
    /// Explicit config file; replaces the `.town.toml` walk-up
    pub config_path: Option<PathBuf>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables (`TOWN_ROOT`, `TOWN_IDENTITY`)
/// 3. Town-local config (`.town.toml` in current dir or a parent, up to a git root)
/// 4. Global config (`<home>/.config/town/config.toml`)
/// 5. Defaults
///
/// Files are merged table by table, so a town-local file only overrides the
/// keys it sets. Unparseable discovered files are warned about and skipped;
/// an explicit `config_path` that cannot be loaded is an error.
///
/// When no source names a town root, the directory holding the town-local
/// config is used, else `current_dir`. Relative roots are taken relative to
/// `current_dir`.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    current_dir: &Path,
    home_dir: &Path,
) -> Result<Config, ConfigError> {
    let mut merged = toml::Table::new();

    // 4. Global config
    let global_path = crate::home::global_config_dir(home_dir).join("config.toml");
    if global_path.exists() {
        match load_config_file(&global_path) {
            Ok(table) => merge_tables(&mut merged, table),
            Err(e) => warn!("Skipping global config: {e}"),
        }
    }

    // 3. Town-local config, or the explicit file
    let local_path = match &overrides.config_path {
        Some(path) => {
            let path = current_dir.join(path);
            merge_tables(&mut merged, load_config_file(&path)?);
            Some(path)
        }
        None => find_local_config(current_dir).and_then(|path| match load_config_file(&path) {
            Ok(table) => {
                merge_tables(&mut merged, table);
                Some(path)
            }
            Err(e) => {
                warn!("Skipping town config: {e}");
                None
            }
        }),
    };

    let mut config: Config = toml::Value::Table(merged)
        .try_into()
        .map_err(|source| ConfigError::Parse {
            path: local_path.clone().unwrap_or(global_path),
            source,
        })?;

    // 2. Environment
    apply_env_overrides(&mut config);

    // 1. Command line
    if let Some(root) = &overrides.town_root {
        config.core.town_root = Some(root.clone());
    }
    if let Some(identity) = &overrides.identity {
        config.core.identity = identity.clone();
    }

    let root = match config.core.town_root.take() {
        Some(root) if root.is_relative() => current_dir.join(root),
        Some(root) => root,
        None => local_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| current_dir.to_path_buf()),
    };
    debug!("Town root: {}", root.display());
    config.core.town_root = Some(root);

    Ok(config)
}

/// Find `.town.toml` in `current_dir` or a parent, stopping at a git root.
fn find_local_config(current_dir: &Path) -> Option<PathBuf> {
    let mut dir = current_dir;

    loop {
        let config_path = dir.join(LOCAL_CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if dir.join(".git").exists() {
            break;
        }

        dir = dir.parent()?;
    }

    None
}

/// Load and validate one config file.
fn load_config_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let table: toml::Table = toml::from_str(&contents).map_err(parse_err)?;
    // Reject files whose values have the wrong shape before they are merged.
    Config::deserialize_check(&table).map_err(parse_err)?;
    Ok(table)
}

/// Merge `overlay` into `base`; nested tables merge, everything else replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(root) = env_value(TOWN_ROOT_ENV) {
        config.core.town_root = Some(PathBuf::from(root));
    }
    if let Some(identity) = env_value(TOWN_IDENTITY_ENV) {
        config.core.identity = identity;
    }
}

impl Config {
    fn deserialize_check(table: &toml::Table) -> Result<(), toml::de::Error> {
        let _: Config = toml::Value::Table(table.clone()).try_into()?;
        Ok(())
    }
}
