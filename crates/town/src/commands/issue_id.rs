//! Issue-id command implementation

use anyhow::Result;
use clap::Args;
use serde_json::json;
use town_core::identity::looks_like_issue_id;
use town_core::registry::default_registry;

use super::GlobalArgs;

/// Report whether a token looks like an issue identifier
#[derive(Args, Debug)]
pub struct IssueIdArgs {
    /// Token to test, e.g. `gt-abc12`
    #[arg(allow_hyphen_values = true)]
    token: String,
}

/// Prints `yes` or `no`; exit code 1 on `no`.
pub fn execute(args: IssueIdArgs, global: &GlobalArgs) -> Result<i32> {
    let is_issue = looks_like_issue_id(&args.token, &default_registry());

    if global.json {
        let output = json!({ "token": args.token, "issue_id": is_issue });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", if is_issue { "yes" } else { "no" });
    }
    Ok(if is_issue { 0 } else { 1 })
}
