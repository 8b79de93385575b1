//! Process termination primitives
//!
//! Signals are delivered with a direct `kill(2)` call rather than by running
//! the `kill` utility: a spawned `kill` that shares the target's process group
//! can end up signalling the caller too.
//!
//! Both operations treat "no such process" (`ESRCH`) as success since the
//! target being gone is what the caller wanted. Every other OS error is
//! returned unchanged. Platforms without `kill(2)` get [`UnsupportedSignaller`],
//! which fails every call.
//!
//! [`output_with_deadline`] runs the external `tmux` and `bd` binaries under
//! a hard time limit.

mod command;
#[cfg(unix)]
mod posix;
#[cfg(not(unix))]
mod unsupported;

pub use command::{CommandError, DEFAULT_COMMAND_TIMEOUT, output_with_deadline};
#[cfg(unix)]
pub use posix::PosixSignaller;
#[cfg(not(unix))]
pub use unsupported::UnsupportedSignaller;

use std::num::ParseIntError;
use thiserror::Error;

/// Signaller for the current build target.
#[cfg(unix)]
pub type DefaultSignaller = PosixSignaller;
/// Signaller for the current build target.
#[cfg(not(unix))]
pub type DefaultSignaller = UnsupportedSignaller;

/// Signals the terminator knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Polite termination request (`SIGTERM`)
    Term,
    /// Forced termination (`SIGKILL`)
    Kill,
    /// Interrupt (`SIGINT`)
    Int,
    /// Hangup (`SIGHUP`)
    Hup,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Term => write!(f, "SIGTERM"),
            Self::Kill => write!(f, "SIGKILL"),
            Self::Int => write!(f, "SIGINT"),
            Self::Hup => write!(f, "SIGHUP"),
        }
    }
}

/// Process termination errors
#[derive(Debug, Error)]
pub enum TerminateError {
    /// Identifier did not parse as an integer
    #[error("invalid process id '{input}': {source}")]
    InvalidId {
        input: String,
        #[source]
        source: ParseIntError,
    },

    /// Zero or negative ids address the caller's own process group
    #[error("refusing to signal non-positive process id {id}")]
    NonPositiveId { id: i32 },

    /// OS rejected the signal (anything other than "no such process")
    #[error("{signal} to {target} failed: {source}")]
    Os {
        target: String,
        signal: Signal,
        #[source]
        source: std::io::Error,
    },

    /// No signal primitive on this platform
    #[error("{operation}: not supported on this platform")]
    Unsupported { operation: &'static str },
}

/// Delivers signals to a process or a process group.
pub trait ProcessSignaller: Send + Sync {
    /// Signal a single process. `pid` is trimmed before parsing.
    fn signal_pid(&self, pid: &str, signal: Signal) -> Result<(), TerminateError>;

    /// Signal every process in the group `pgid`. `pgid` is trimmed before parsing.
    fn signal_group(&self, pgid: &str, signal: Signal) -> Result<(), TerminateError>;
}

/// Parse a trimmed, strictly positive process identifier.
pub fn parse_process_id(input: &str) -> Result<i32, TerminateError> {
    let id: i32 = input
        .trim()
        .parse()
        .map_err(|source| TerminateError::InvalidId {
            input: input.to_string(),
            source,
        })?;
    if id <= 0 {
        return Err(TerminateError::NonPositiveId { id });
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process_id_trims() {
        assert_eq!(parse_process_id(" 4242\n").unwrap(), 4242);
    }

    #[test]
    fn test_parse_process_id_rejects_garbage() {
        assert!(matches!(
            parse_process_id("12ab"),
            Err(TerminateError::InvalidId { .. })
        ));
        assert!(matches!(
            parse_process_id(""),
            Err(TerminateError::InvalidId { .. })
        ));
        assert!(matches!(
            parse_process_id("99999999999"),
            Err(TerminateError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_parse_process_id_rejects_non_positive() {
        assert!(matches!(
            parse_process_id("0"),
            Err(TerminateError::NonPositiveId { id: 0 })
        ));
        assert!(matches!(
            parse_process_id("-5"),
            Err(TerminateError::NonPositiveId { id: -5 })
        ));
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::Term.to_string(), "SIGTERM");
        assert_eq!(Signal::Kill.to_string(), "SIGKILL");
    }
}
