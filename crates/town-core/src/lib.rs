//! Identity, health and remediation core for a tmux-hosted agent fleet
//!
//! Agents ("polecats", crew members, town-level supervisors) run inside
//! terminal-multiplexer sessions grouped into rigs. This crate provides:
//!
//! - [`registry`]: rig prefix ↔ rig name bindings
//! - [`identity`]: target path → canonical session name, and legacy-name detection
//! - [`doctor`]: diagnostic checks, including the session-name-format check
//! - [`warrant`]: durable, duplicate-suppressed termination orders
//! - [`process`]: platform-aware signal delivery
//! - [`mux`] and [`beads`]: the session manager and status-store capabilities

pub mod beads;
pub mod config;
pub mod doctor;
pub mod home;
pub mod identity;
pub mod io;
pub mod logging;
pub mod mux;
pub mod process;
pub mod registry;
pub mod roster;
pub mod warrant;

pub use registry::{PrefixRegistry, RegistryError, TOWN_PREFIX};
