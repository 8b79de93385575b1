//! Session-name command implementation

use anyhow::Result;
use clap::Args;
use serde_json::json;
use town_core::identity::target_to_session_name;
use town_core::registry::default_registry;

use super::GlobalArgs;

/// Print the canonical session name for a target path
#[derive(Args, Debug)]
pub struct SessionNameArgs {
    /// Target path, e.g. `gastown/polecats/toast` or `deacon/dogs/alpha`
    target: String,
}

pub fn execute(args: SessionNameArgs, global: &GlobalArgs) -> Result<i32> {
    let session = target_to_session_name(&args.target, &default_registry())?;

    if global.json {
        let output = json!({ "target": args.target, "session": session });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{session}");
    }
    Ok(0)
}
