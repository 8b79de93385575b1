//! Per-agent health classification
//!
//! Two signals are combined, and they are updated independently:
//!
//! - session liveness from the multiplexer (authoritative when live)
//! - `agent_state` from the agent's bead record
//!
//! The record is written when work is accepted, before the session is
//! launched. An absent session with `agent_state: spawning` is therefore a
//! normal startup window and must not be treated as a crash, or the agent
//! would be respawned twice. Any failure to read either signal yields
//! [`Health::Inconclusive`]: missing evidence is never evidence of a crash.

use serde::Serialize;
use std::sync::Arc;
use town_core::beads::{AgentRecord, AgentState, BeadStore};
use town_core::identity::{POLECATS, polecat_bead_id, target_to_session_name};
use town_core::mux::Multiplexer;
use town_core::registry::PrefixRegistry;
use tracing::{debug, error, info, warn};

/// Health classification of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum Health {
    /// Session is live
    Healthy,
    /// No session yet, record says spawning
    PendingStart,
    /// Session gone while the record says the agent is working
    Crashed,
    /// Session gone and the agent is idle or finished
    Dormant,
    /// Session gone and no status record exists
    Untracked,
    /// A signal could not be read
    Inconclusive(String),
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::PendingStart => write!(f, "pending-start"),
            Self::Crashed => write!(f, "crashed"),
            Self::Dormant => write!(f, "dormant"),
            Self::Untracked => write!(f, "untracked"),
            Self::Inconclusive(reason) => write!(f, "inconclusive ({reason})"),
        }
    }
}

/// Classify an agent whose two signals were read successfully.
pub fn classify(session_live: bool, record: Option<&AgentRecord>) -> Health {
    if session_live {
        return Health::Healthy;
    }
    match record.map(|r| &r.state) {
        None => Health::Untracked,
        Some(AgentState::Spawning) => Health::PendingStart,
        Some(state) if state.is_active() => Health::Crashed,
        Some(_) => Health::Dormant,
    }
}

/// Outcome of one agent check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Target path, e.g. `gastown/polecats/toast`
    pub target: String,
    /// Canonical session name; empty if the target could not be resolved
    pub session: String,
    pub health: Health,
    /// Recorded state, when the record was read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_bead: Option<String>,
}

impl HealthReport {
    pub fn inconclusive(target: &str, session: &str, reason: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            session: session.to_string(),
            health: Health::Inconclusive(reason.into()),
            state: None,
            hook_bead: None,
        }
    }

    pub fn is_crash(&self) -> bool {
        self.health == Health::Crashed
    }
}

/// Checks agents against the multiplexer and the bead store.
pub struct HealthMonitor {
    registry: Arc<PrefixRegistry>,
    mux: Arc<dyn Multiplexer>,
    beads: Arc<dyn BeadStore>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<PrefixRegistry>,
        mux: Arc<dyn Multiplexer>,
        beads: Arc<dyn BeadStore>,
    ) -> Self {
        Self {
            registry,
            mux,
            beads,
        }
    }

    /// Check polecat `name` of `rig`.
    ///
    /// Blocking: runs the multiplexer and bead-store queries inline.
    pub fn check_polecat(&self, rig: &str, name: &str) -> HealthReport {
        let target = format!("{rig}/{POLECATS}/{name}");

        let session = match target_to_session_name(&target, &self.registry) {
            Ok(session) => session,
            Err(e) => {
                warn!("Cannot resolve session for {target}: {e}");
                return HealthReport::inconclusive(&target, "", e.to_string());
            }
        };

        let live = match self.mux.has_session(&session) {
            Ok(live) => live,
            Err(e) => {
                warn!("Health check for {target} inconclusive: {e}");
                return HealthReport::inconclusive(&target, &session, e.to_string());
            }
        };
        if live {
            debug!("Polecat {target} healthy ({session})");
            return HealthReport {
                target,
                session,
                health: Health::Healthy,
                state: None,
                hook_bead: None,
            };
        }

        let bead_id = polecat_bead_id(rig, name, &self.registry);
        let record = match self.beads.agent_record(&bead_id) {
            Ok(record) => record,
            Err(e) => {
                warn!("Health check for {target} inconclusive: {e}");
                return HealthReport::inconclusive(&target, &session, e.to_string());
            }
        };

        let health = classify(false, record.as_ref());
        let state = record.as_ref().map(|r| r.state.to_string());
        let hook_bead = record.and_then(|r| r.hook_bead);
        let state_label = state.as_deref().unwrap_or("none");

        match &health {
            Health::PendingStart => info!(
                "Polecat {target} has no session yet (agent_state={state_label}): pending-start, not a crash"
            ),
            Health::Crashed => error!(
                "CRASH DETECTED: polecat {target} session {session} is gone (agent_state={state_label}, hook_bead={})",
                hook_bead.as_deref().unwrap_or("none")
            ),
            Health::Dormant => debug!("Polecat {target} dormant (agent_state={state_label})"),
            Health::Untracked => debug!("Polecat {target} has no session and no record {bead_id}"),
            Health::Healthy | Health::Inconclusive(_) => {}
        }

        HealthReport {
            target,
            session,
            health,
            state,
            hook_bead,
        }
    }
}
