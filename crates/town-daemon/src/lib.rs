//! Fleet health monitoring
//!
//! [`health`] classifies one agent from its session liveness and its bead
//! record; [`heartbeat`] runs that check across the roster on a fixed cadence.

pub mod health;
pub mod heartbeat;

pub use health::{Health, HealthMonitor, HealthReport, classify};
pub use heartbeat::{CrashWarrants, CycleSummary, Heartbeat, HeartbeatConfig, Roster, TownRoster};
