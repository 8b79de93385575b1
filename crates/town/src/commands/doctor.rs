//! Doctor command implementation
//!
//! `town doctor`        -- run diagnostic checks
//! `town doctor --fix`  -- repair what can be repaired, then re-check

use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::sync::Arc;
use town_core::doctor::{CheckContext, CheckOutcome, CheckStatus, Doctor, MalformedSessionNameCheck};
use town_core::mux::TmuxCli;

use super::{GlobalArgs, Town};

/// Run diagnostic checks
#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Attempt to fix problems automatically
    #[arg(long)]
    fix: bool,

    /// Include extra detail for passing checks
    #[arg(short, long)]
    verbose: bool,
}

fn prefix(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Ok => "[OK]",
        CheckStatus::Warning => "[WARN]",
        CheckStatus::Error => "[FAIL]",
    }
}

fn print_outcome(outcome: &CheckOutcome) {
    println!(
        "{} {}: {}",
        prefix(outcome.result.status),
        outcome.name,
        outcome.result.message
    );
    for detail in &outcome.result.details {
        println!("    {detail}");
    }
    if let Some(error) = &outcome.fix_error {
        println!("    fix failed: {error}");
    }
}

/// Exit code 1 when any check reports an error.
pub fn execute(args: DoctorArgs, town: &Town, global: &GlobalArgs) -> Result<i32> {
    let mux = Arc::new(
        TmuxCli::new(&town.config.commands.tmux).with_timeout(town.config.commands.timeout()),
    );
    let mut doctor = Doctor::new().with_check(Box::new(MalformedSessionNameCheck::new(mux)));

    let ctx = CheckContext {
        town_root: town.config.town_root().to_path_buf(),
        registry: Arc::clone(&town.registry),
        verbose: args.verbose,
    };
    let report = doctor.run(&ctx, args.fix);

    if global.json {
        let output = json!({
            "checks": report.outcomes,
            "summary": {
                "passed": report.ok_count(),
                "warnings": report.warning_count(),
                "failures": report.error_count(),
            }
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Town Doctor");
        println!("===========");
        println!();
        for outcome in &report.outcomes {
            print_outcome(outcome);
        }
        println!();
        println!("Summary: {report}");
    }

    Ok(if report.has_errors() { 1 } else { 0 })
}
