//! Warrant command implementation

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::sync::Arc;
use town_core::mux::TmuxCli;
use town_core::process::DefaultSignaller;
use town_core::warrant::{FileOutcome, Warrant, WarrantExecutor, WarrantStore};

use super::{GlobalArgs, Town};

/// File, inspect, and execute warrants
#[derive(Args, Debug)]
pub struct WarrantArgs {
    #[command(subcommand)]
    command: WarrantCommand,
}

#[derive(Subcommand, Debug)]
enum WarrantCommand {
    /// File a warrant against a target (no-op while one is pending)
    File {
        /// Target path, e.g. `gastown/polecats/toast`
        target: String,

        /// Why the target should be terminated
        #[arg(long)]
        reason: String,

        /// Filer identity (default: configured identity)
        #[arg(long, value_name = "ID")]
        filed_by: Option<String>,
    },

    /// List all warrants
    List,

    /// Show the warrant for a target
    Show {
        target: String,
    },

    /// Terminate the target's session and mark its warrant executed
    Execute {
        target: String,
    },
}

fn status_label(warrant: &Warrant) -> &'static str {
    if warrant.executed {
        "executed"
    } else {
        "pending"
    }
}

fn print_warrant(warrant: &Warrant) {
    println!("Warrant {}", warrant.id);
    println!("  target:   {}", warrant.target);
    println!("  reason:   {}", warrant.reason);
    println!("  filed by: {}", warrant.filed_by);
    println!("  filed at: {}", warrant.filed_at.to_rfc3339());
    match warrant.executed_at {
        Some(at) => println!("  status:   executed at {}", at.to_rfc3339()),
        None => println!("  status:   pending"),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn execute(args: WarrantArgs, town: &Town, global: &GlobalArgs) -> Result<i32> {
    let store = WarrantStore::new(town.config.warrant_dir());

    match args.command {
        WarrantCommand::File {
            target,
            reason,
            filed_by,
        } => {
            let filed_by = filed_by.unwrap_or_else(|| town.config.core.identity.clone());
            let outcome = store
                .file(&target, &reason, &filed_by)
                .with_context(|| format!("Failed to file warrant for {target}"))?;
            if global.json {
                print_json(&serde_json::json!({
                    "filed": matches!(outcome, FileOutcome::Filed(_)),
                    "warrant": outcome.warrant(),
                }))?;
            } else {
                match &outcome {
                    FileOutcome::Filed(w) => println!("Filed warrant {} against {target}", w.id),
                    FileOutcome::AlreadyPending(w) => {
                        println!("Warrant {} already pending against {target}", w.id)
                    }
                }
            }
        }
        WarrantCommand::List => {
            let warrants = store.list().context("Failed to list warrants")?;
            if global.json {
                print_json(&warrants)?;
            } else if warrants.is_empty() {
                println!("No warrants");
            } else {
                for w in &warrants {
                    println!("{:<9} {:<40} {}", status_label(w), w.target, w.reason);
                }
            }
        }
        WarrantCommand::Show { target } => {
            let warrant = store
                .load(&target)
                .with_context(|| format!("Failed to read warrant for {target}"))?
                .with_context(|| format!("No warrant filed for {target}"))?;
            if global.json {
                print_json(&warrant)?;
            } else {
                print_warrant(&warrant);
            }
        }
        WarrantCommand::Execute { target } => {
            let executor = WarrantExecutor::new(
                store,
                Arc::clone(&town.registry),
                Arc::new(
                    TmuxCli::new(&town.config.commands.tmux)
                        .with_timeout(town.config.commands.timeout()),
                ),
                Arc::new(DefaultSignaller::new()),
            )
            .with_grace(town.config.kill_grace());
            let warrant = executor
                .execute(&target)
                .with_context(|| format!("Failed to execute warrant for {target}"))?;
            if global.json {
                print_json(&warrant)?;
            } else {
                println!("Executed warrant {} against {target}", warrant.id);
            }
        }
    }
    Ok(0)
}
