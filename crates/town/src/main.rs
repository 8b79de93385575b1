//! town - operator CLI for the agent fleet
//!
//! Diagnoses session naming drift, files and executes warrants, and exposes
//! the identity rules (`session-name`, `issue-id`) for scripts.

use clap::Parser;

mod commands;

use commands::Cli;

fn main() {
    let cli = Cli::parse();
    town_core::logging::init();

    match cli.execute() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
