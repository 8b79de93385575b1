//! CLI command dispatch and execution

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use town_core::config::{Config, ConfigOverrides, resolve_config};
use town_core::registry::{PrefixRegistry, set_default_registry};

mod doctor;
mod issue_id;
mod session_name;
mod warrant;

/// town - operator CLI for the agent fleet
#[derive(Parser, Debug)]
#[command(
    name = "town",
    version,
    about = "Operator CLI for a tmux-hosted agent fleet",
    long_about = "Diagnose session naming drift, manage warrants, and resolve agent identities"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Town root directory
    #[arg(long, global = true, value_name = "DIR")]
    town_root: Option<PathBuf>,

    /// Identity recorded on filed warrants
    #[arg(long, global = true, value_name = "ID")]
    identity: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run diagnostic checks
    Doctor(doctor::DoctorArgs),

    /// File, inspect, and execute warrants
    Warrant(warrant::WarrantArgs),

    /// Print the canonical session name for a target path
    SessionName(session_name::SessionNameArgs),

    /// Report whether a token looks like an issue identifier
    IssueId(issue_id::IssueIdArgs),
}

impl Cli {
    /// Execute the CLI command, returning the process exit code
    pub fn execute(self) -> Result<i32> {
        let town = Town::load(&self.global)?;
        match self.command {
            Commands::Doctor(args) => doctor::execute(args, &town, &self.global),
            Commands::Warrant(args) => warrant::execute(args, &town, &self.global),
            Commands::SessionName(args) => session_name::execute(args, &self.global),
            Commands::IssueId(args) => issue_id::execute(args, &self.global),
        }
    }
}

/// Resolved configuration and the registry built from it.
pub struct Town {
    pub config: Config,
    pub registry: Arc<PrefixRegistry>,
}

impl Town {
    /// Resolve configuration and install its registry as the process default.
    fn load(global: &GlobalArgs) -> Result<Self> {
        let home_dir = town_core::home::get_home_dir()?;
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;

        let overrides = ConfigOverrides {
            town_root: global.town_root.clone(),
            identity: global.identity.clone(),
            config_path: None,
        };
        let config = resolve_config(&overrides, &current_dir, &home_dir)
            .context("Failed to resolve configuration")?;
        let registry = Arc::new(config.registry().context("Invalid [[rigs]] configuration")?);
        set_default_registry(Arc::clone(&registry));

        Ok(Self { config, registry })
    }
}
