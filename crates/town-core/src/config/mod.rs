//! Configuration resolution
//!
//! Resolves configuration from multiple sources with priority:
//! 1. Command-line flags (passed as parameters)
//! 2. Environment variables
//! 3. Town-local config (.town.toml)
//! 4. Global config (~/.config/town/config.toml)
//! 5. Defaults

mod discovery;
mod types;

pub use discovery::{
    ConfigError, ConfigOverrides, LOCAL_CONFIG_FILE, TOWN_IDENTITY_ENV, TOWN_ROOT_ENV,
    resolve_config,
};
pub use types::{CommandsConfig, Config, CoreConfig, DaemonConfig, RigConfig, WarrantsConfig};
