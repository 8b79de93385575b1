//! `bd` CLI implementation of [`BeadStore`].

use super::{AgentRecord, AgentState, BeadError, BeadStore, parse_agent_fields};
use crate::process::{CommandError, DEFAULT_COMMAND_TIMEOUT, output_with_deadline};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBead {
    id: String,
    description: Option<String>,
    hook_bead: Option<String>,
    agent_state: Option<String>,
    updated_at: Option<String>,
}

/// Queries records with `bd show <id> --json`.
#[derive(Debug, Clone)]
pub struct BdCli {
    bin: PathBuf,
    workdir: Option<PathBuf>,
    timeout: Duration,
}

impl Default for BdCli {
    fn default() -> Self {
        Self::new("bd")
    }
}

impl BdCli {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            workdir: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Kill a `bd` invocation still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `bd` from `dir` (the town root holds the store).
    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "null")
}

/// Parse `bd show --json` output (an array of records or a single record).
pub(crate) fn parse_show_output(bead_id: &str, stdout: &str) -> Result<Option<AgentRecord>, BeadError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parse_err = |source| BeadError::Parse {
        id: bead_id.to_string(),
        source,
    };

    let value: serde_json::Value = serde_json::from_str(trimmed).map_err(parse_err)?;
    let raw_value = match value {
        serde_json::Value::Array(mut items) => {
            if items.is_empty() {
                return Ok(None);
            }
            items.swap_remove(0)
        }
        other => other,
    };
    let raw: RawBead = serde_json::from_value(raw_value).map_err(parse_err)?;

    let fields = raw
        .description
        .as_deref()
        .map(parse_agent_fields)
        .unwrap_or_default();

    let state = fields
        .get("agent_state")
        .cloned()
        .or_else(|| non_empty(raw.agent_state))
        .map(|s| AgentState::parse(&s))
        .unwrap_or_else(|| AgentState::Other(String::new()));

    let hook_bead = non_empty(raw.hook_bead).or_else(|| fields.get("hook_bead").cloned());

    let updated_at = raw.updated_at.as_deref().and_then(|ts| {
        DateTime::parse_from_rfc3339(ts)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| debug!("Ignoring unparseable updated_at '{ts}' on {bead_id}: {e}"))
            .ok()
    });

    Ok(Some(AgentRecord {
        id: if raw.id.is_empty() {
            bead_id.to_string()
        } else {
            raw.id
        },
        state,
        hook_bead,
        updated_at,
    }))
}

impl BeadStore for BdCli {
    fn agent_record(&self, bead_id: &str) -> Result<Option<AgentRecord>, BeadError> {
        let command = format!("bd show {bead_id}");
        let mut cmd = Command::new(&self.bin);
        cmd.arg("show").arg(bead_id).arg("--json");
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let output = output_with_deadline(&mut cmd, self.timeout).map_err(|e| match e {
            CommandError::Io(source) => BeadError::Spawn {
                command: command.clone(),
                source,
            },
            CommandError::TimedOut(timeout) => BeadError::TimedOut {
                command: command.clone(),
                timeout,
            },
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.to_ascii_lowercase().contains("not found") {
                debug!("No bead record for {bead_id}");
                return Ok(None);
            }
            return Err(BeadError::Failed { command, stderr });
        }

        parse_show_output(bead_id, &String::from_utf8_lossy(&output.stdout))
    }
}
