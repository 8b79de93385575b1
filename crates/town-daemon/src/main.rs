//! town-daemon: periodic health checks for the polecat fleet

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use town_core::beads::BdCli;
use town_core::config::{ConfigOverrides, resolve_config};
use town_core::mux::TmuxCli;
use town_core::registry::set_default_registry;
use town_core::warrant::WarrantStore;
use town_daemon::{CrashWarrants, Heartbeat, HeartbeatConfig, HealthMonitor, TownRoster};
use tracing::{info, warn};

/// Periodic health checks for the polecat fleet
#[derive(Parser, Debug)]
#[command(name = "town-daemon")]
#[command(about = "Periodic health checks for the polecat fleet")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Town root directory
    #[arg(long, value_name = "DIR")]
    town_root: Option<PathBuf>,

    /// Run a single heartbeat cycle and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let home_dir = town_core::home::get_home_dir().context("Failed to determine home directory")?;
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;

    let overrides = ConfigOverrides {
        town_root: args.town_root.clone(),
        config_path: args.config.clone(),
        ..Default::default()
    };
    let config = resolve_config(&overrides, &current_dir, &home_dir)
        .context("Failed to resolve configuration")?;
    let registry = Arc::new(config.registry().context("Invalid [[rigs]] configuration")?);
    set_default_registry(Arc::clone(&registry));

    let town_root = config.town_root().to_path_buf();
    info!(
        "town-daemon starting (town root: {}, {} rig(s))",
        town_root.display(),
        registry.len()
    );
    if registry.is_empty() {
        warn!("No rigs configured; nothing to monitor");
    }

    let command_timeout = config.commands.timeout();
    let mux = Arc::new(TmuxCli::new(&config.commands.tmux).with_timeout(command_timeout));
    let beads = Arc::new(
        BdCli::new(&config.commands.bd)
            .with_workdir(&town_root)
            .with_timeout(command_timeout),
    );
    let monitor = Arc::new(HealthMonitor::new(Arc::clone(&registry), mux, beads));
    let roster = Arc::new(TownRoster::new(&town_root, Arc::clone(&registry)));

    let heartbeat_config = HeartbeatConfig {
        interval: config.daemon.heartbeat(),
        check_timeout: config.daemon.check_timeout(),
        max_concurrent_checks: config.daemon.max_concurrent_checks,
    };
    let mut heartbeat = Heartbeat::new(monitor, roster, heartbeat_config);
    if config.daemon.file_warrants_on_crash {
        info!("Crash warrants enabled ({})", config.warrant_dir().display());
        heartbeat = heartbeat.with_crash_warrants(CrashWarrants {
            store: WarrantStore::new(config.warrant_dir()),
            filed_by: config.core.identity.clone(),
        });
    }

    if args.once {
        let summary = heartbeat.run_cycle().await;
        println!("{summary}");
        return Ok(());
    }

    let cancel_token = CancellationToken::new();

    let cancel_for_signals = cancel_token.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        cancel_for_signals.cancel();
    });

    heartbeat.run(cancel_token).await;

    info!("town-daemon shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                match ctrl_c.await {
                    Ok(()) => info!("Received SIGINT (Ctrl+C)"),
                    Err(e) => {
                        warn!("Failed to listen for Ctrl+C: {e}");
                        std::future::pending::<()>().await;
                    }
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        match ctrl_c.await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => {
                warn!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    }
}
