//! Configuration types

use super::ConfigError;
use crate::registry::PrefixRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,
    /// Rig bindings: `[[rigs]]` tables with `name` and `prefix`
    #[serde(default)]
    pub rigs: Vec<RigConfig>,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub warrants: WarrantsConfig,
    /// External binaries
    #[serde(default)]
    pub commands: CommandsConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Town root directory (rig directories live beneath it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub town_root: Option<PathBuf>,
    /// Identity recorded as the filer of warrants
    #[serde(default = "default_identity")]
    pub identity: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            town_root: None,
            identity: default_identity(),
        }
    }
}

fn default_identity() -> String {
    "human".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigConfig {
    pub name: String,
    pub prefix: String,
}

/// Heartbeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between heartbeat cycles (default: 180)
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Per-agent check timeout in seconds (default: 30)
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,
    /// Agent checks run concurrently within a cycle (default: 4)
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    /// File a warrant for every detected crash (default: false)
    #[serde(default)]
    pub file_warrants_on_crash: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            check_timeout_secs: default_check_timeout_secs(),
            max_concurrent_checks: default_max_concurrent_checks(),
            file_warrants_on_crash: false,
        }
    }
}

impl DaemonConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs.max(1))
    }
}

fn default_heartbeat_secs() -> u64 {
    180
}

fn default_check_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_checks() -> usize {
    4
}

/// Warrant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarrantsConfig {
    /// Warrant directory (default: `<town_root>/warrants`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Milliseconds between SIGTERM and SIGKILL (default: 2000)
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

impl Default for WarrantsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

fn default_kill_grace_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_tmux")]
    pub tmux: PathBuf,
    #[serde(default = "default_bd")]
    pub bd: PathBuf,
    /// Seconds before a hung `tmux` or `bd` call is killed (default: 10)
    #[serde(default = "default_command_timeout_secs")]
    pub timeout_secs: u64,
}

impl CommandsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_command_timeout_secs() -> u64 {
    10
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            tmux: default_tmux(),
            bd: default_bd(),
            timeout_secs: default_command_timeout_secs(),
        }
    }
}

fn default_tmux() -> PathBuf {
    PathBuf::from("tmux")
}

fn default_bd() -> PathBuf {
    PathBuf::from("bd")
}

impl Config {
    /// Town root; `.` until resolution fills it in.
    pub fn town_root(&self) -> &Path {
        self.core.town_root.as_deref().unwrap_or(Path::new("."))
    }

    pub fn warrant_dir(&self) -> PathBuf {
        self.warrants
            .dir
            .clone()
            .unwrap_or_else(|| self.town_root().join("warrants"))
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.warrants.kill_grace_ms)
    }

    /// Build the prefix registry from `[[rigs]]`.
    ///
    /// # Errors
    ///
    /// Conflicting or invalid bindings.
    pub fn registry(&self) -> Result<PrefixRegistry, ConfigError> {
        let registry =
            PrefixRegistry::from_entries(self.rigs.iter().map(|r| (&r.prefix, &r.name)))?;
        Ok(registry)
    }
}
