//! Terminal-multiplexer capability
//!
//! The session manager is an external collaborator. Core logic only sees the
//! [`Multiplexer`] trait; [`TmuxCli`] drives a real tmux server and
//! [`InMemoryMultiplexer`] backs tests.
//!
//! Errors from this layer are transport/OS failures. A missing session is
//! never an error: `has_session` answers `false`, `kill_session` and
//! `rename_session` succeed because the desired end state already holds.

mod memory;
mod tmux;

pub use memory::{InMemoryMultiplexer, MuxCall};
pub use tmux::TmuxCli;

use std::time::Duration;
use thiserror::Error;

/// Multiplexer transport errors
#[derive(Debug, Error)]
pub enum MuxError {
    /// The multiplexer binary could not be started
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The multiplexer ran but reported a failure
    #[error("{command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    /// The multiplexer did not answer in time and was killed
    #[error("{command} timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

/// Session operations consumed by the health monitor, doctor and warrants.
pub trait Multiplexer: Send + Sync {
    /// Return `true` if a session named exactly `name` is live.
    fn has_session(&self, name: &str) -> Result<bool, MuxError>;

    /// Rename session `old` to `new` in one multiplexer operation.
    fn rename_session(&self, old: &str, new: &str) -> Result<(), MuxError>;

    /// Names of all live sessions.
    fn list_sessions(&self) -> Result<Vec<String>, MuxError>;

    /// Kill session `name`; an absent session is success.
    fn kill_session(&self, name: &str) -> Result<(), MuxError>;

    /// Pid of the first pane's process in `name`, `None` if the session is gone.
    fn session_pid(&self, name: &str) -> Result<Option<String>, MuxError>;
}
