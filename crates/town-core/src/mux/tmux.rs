//! tmux CLI implementation of [`Multiplexer`].

use super::{Multiplexer, MuxError};
use crate::process::{CommandError, DEFAULT_COMMAND_TIMEOUT, output_with_deadline};
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::Duration;
use tracing::debug;

/// stderr fragments tmux prints when the session or the server is absent.
const ABSENCE_MARKERS: &[&str] = &["can't find session", "session not found", "no server running"];

/// Socket errors mean absence only when the socket file does not exist;
/// `Permission denied` and friends are real failures.
const CONNECT_ERROR: &str = "error connecting to";
const NO_SOCKET: &str = "no such file or directory";

fn is_absence(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    if ABSENCE_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }
    lower
        .lines()
        .any(|line| line.contains(CONNECT_ERROR) && line.contains(NO_SOCKET))
}

/// Exact-match session target; plain `-t name` would prefix-match.
fn exact(name: &str) -> String {
    format!("={name}")
}

/// Drives the tmux binary.
#[derive(Debug, Clone)]
pub struct TmuxCli {
    bin: PathBuf,
    timeout: Duration,
}

impl Default for TmuxCli {
    fn default() -> Self {
        Self::new("tmux")
    }
}

impl TmuxCli {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Kill any tmux invocation still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, args: &[&str]) -> Result<(String, Output), MuxError> {
        let command = format!("tmux {}", args.first().copied().unwrap_or_default());
        let output = output_with_deadline(Command::new(&self.bin).args(args), self.timeout)
            .map_err(|e| match e {
                CommandError::Io(source) => MuxError::Spawn {
                    command: command.clone(),
                    source,
                },
                CommandError::TimedOut(timeout) => MuxError::TimedOut {
                    command: command.clone(),
                    timeout,
                },
            })?;
        Ok((command, output))
    }

    fn failed(command: String, output: &Output) -> MuxError {
        MuxError::Failed {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

impl Multiplexer for TmuxCli {
    fn has_session(&self, name: &str) -> Result<bool, MuxError> {
        let (command, output) = self.run(&["has-session", "-t", &exact(name)])?;
        if output.status.success() {
            return Ok(true);
        }
        if is_absence(&String::from_utf8_lossy(&output.stderr)) {
            return Ok(false);
        }
        Err(Self::failed(command, &output))
    }

    fn rename_session(&self, old: &str, new: &str) -> Result<(), MuxError> {
        let (command, output) = self.run(&["rename-session", "-t", &exact(old), new])?;
        if output.status.success() {
            debug!("Renamed tmux session {old} -> {new}");
            return Ok(());
        }
        if is_absence(&String::from_utf8_lossy(&output.stderr)) {
            debug!("tmux session {old} already gone; rename to {new} not needed");
            return Ok(());
        }
        Err(Self::failed(command, &output))
    }

    fn list_sessions(&self) -> Result<Vec<String>, MuxError> {
        let (command, output) = self.run(&["list-sessions", "-F", "#{session_name}"])?;
        if !output.status.success() {
            if is_absence(&String::from_utf8_lossy(&output.stderr)) {
                return Ok(Vec::new());
            }
            return Err(Self::failed(command, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        let (command, output) = self.run(&["kill-session", "-t", &exact(name)])?;
        if output.status.success() || is_absence(&String::from_utf8_lossy(&output.stderr)) {
            return Ok(());
        }
        Err(Self::failed(command, &output))
    }

    fn session_pid(&self, name: &str) -> Result<Option<String>, MuxError> {
        let (command, output) =
            self.run(&["list-panes", "-s", "-t", &exact(name), "-F", "#{pane_pid}"])?;
        if !output.status.success() {
            if is_absence(&String::from_utf8_lossy(&output.stderr)) {
                return Ok(None);
            }
            return Err(Self::failed(command, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string))
    }
}
