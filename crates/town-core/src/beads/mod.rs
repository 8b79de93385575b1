//! Bead-store capability (agent status records)
//!
//! Agent status lives in an external issue store. The core only reads it, and
//! treats it as eventually consistent with the real process state: a record
//! can say `working` for a session that just died, or `spawning` for a
//! session that is about to start.

mod bd;
mod memory;

pub use bd::BdCli;
pub use memory::InMemoryBeadStore;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Bead-store transport errors
#[derive(Debug, Error)]
pub enum BeadError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("{command} timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("unparseable record for {id}: {source}")]
    Parse {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Lifecycle state recorded for an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    /// Work accepted, session not launched yet
    Spawning,
    /// Running an assignment
    Working,
    Idle,
    Done,
    /// A crash was already recorded
    Crashed,
    Other(String),
}

impl AgentState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spawning" => Self::Spawning,
            "working" | "running" => Self::Working,
            "idle" => Self::Idle,
            "done" => Self::Done,
            "crashed" => Self::Crashed,
            other => Self::Other(other.to_string()),
        }
    }

    /// `true` when the agent is supposed to have a live session doing work.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Working | Self::Crashed)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawning => write!(f, "spawning"),
            Self::Working => write!(f, "working"),
            Self::Idle => write!(f, "idle"),
            Self::Done => write!(f, "done"),
            Self::Crashed => write!(f, "crashed"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Agent status record as read from the bead store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRecord {
    pub id: String,
    pub state: AgentState,
    /// Work item the agent is hooked to, if any
    pub hook_bead: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Read access to agent status records.
pub trait BeadStore: Send + Sync {
    /// Fetch the record for `bead_id`; `Ok(None)` when no such record exists.
    fn agent_record(&self, bead_id: &str) -> Result<Option<AgentRecord>, BeadError>;
}

/// Extract `key: value` fields from a record description.
///
/// Keys are lowercased; blank values and the literal `null` are dropped.
pub fn parse_agent_fields(description: &str) -> HashMap<String, String> {
    description
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter_map(|(key, value)| {
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            if key.is_empty() || key.contains(' ') || value.is_empty() || value == "null" {
                None
            } else {
                Some((key, value.to_string()))
            }
        })
        .collect()
}
