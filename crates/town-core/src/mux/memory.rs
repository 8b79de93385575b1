//! In-memory [`Multiplexer`] for tests and dry runs.
//!
//! Records every call so tests can assert on what was (or was not) attempted,
//! and can simulate an unreachable server.

use super::{Multiplexer, MuxError};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// A recorded multiplexer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxCall {
    HasSession(String),
    Rename { from: String, to: String },
    List,
    Kill(String),
    SessionPid(String),
}

#[derive(Debug, Default)]
struct MemState {
    /// session name → pane pid
    sessions: BTreeMap<String, Option<String>>,
    calls: Vec<MuxCall>,
    unavailable: Option<String>,
}

/// Session table held in memory.
#[derive(Debug, Default)]
pub struct InMemoryMultiplexer {
    state: Mutex<MemState>,
}

impl InMemoryMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with the given live sessions (no pane pids).
    pub fn with_sessions<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mux = Self::new();
        for name in names {
            mux.add_session(name, None);
        }
        mux
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_session(&self, name: impl Into<String>, pane_pid: Option<String>) {
        self.lock().sessions.insert(name.into(), pane_pid);
    }

    pub fn remove_session(&self, name: &str) {
        self.lock().sessions.remove(name);
    }

    /// Make every subsequent call fail with `reason` (`None` restores service).
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.lock().unavailable = reason.map(str::to_string);
    }

    pub fn session_names(&self) -> Vec<String> {
        self.lock().sessions.keys().cloned().collect()
    }

    pub fn calls(&self) -> Vec<MuxCall> {
        self.lock().calls.clone()
    }

    /// Recorded rename attempts as `(from, to)` pairs.
    pub fn renames(&self) -> Vec<(String, String)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MuxCall::Rename { from, to } => Some((from.clone(), to.clone())),
                _ => None,
            })
            .collect()
    }

    /// Recorded kill attempts.
    pub fn kills(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MuxCall::Kill(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MuxCall) -> Result<MutexGuard<'_, MemState>, MuxError> {
        let mut state = self.lock();
        let command = match &call {
            MuxCall::HasSession(_) => "has-session",
            MuxCall::Rename { .. } => "rename-session",
            MuxCall::List => "list-sessions",
            MuxCall::Kill(_) => "kill-session",
            MuxCall::SessionPid(_) => "list-panes",
        };
        state.calls.push(call);
        if let Some(reason) = state.unavailable.clone() {
            return Err(MuxError::Failed {
                command: format!("memory {command}"),
                stderr: reason,
            });
        }
        Ok(state)
    }
}

impl Multiplexer for InMemoryMultiplexer {
    fn has_session(&self, name: &str) -> Result<bool, MuxError> {
        let state = self.record(MuxCall::HasSession(name.to_string()))?;
        Ok(state.sessions.contains_key(name))
    }

    fn rename_session(&self, old: &str, new: &str) -> Result<(), MuxError> {
        let mut state = self.record(MuxCall::Rename {
            from: old.to_string(),
            to: new.to_string(),
        })?;
        if state.sessions.contains_key(new) {
            return Err(MuxError::Failed {
                command: "memory rename-session".to_string(),
                stderr: format!("duplicate session: {new}"),
            });
        }
        if let Some(pid) = state.sessions.remove(old) {
            state.sessions.insert(new.to_string(), pid);
        }
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<String>, MuxError> {
        let state = self.record(MuxCall::List)?;
        Ok(state.sessions.keys().cloned().collect())
    }

    fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        let mut state = self.record(MuxCall::Kill(name.to_string()))?;
        state.sessions.remove(name);
        Ok(())
    }

    fn session_pid(&self, name: &str) -> Result<Option<String>, MuxError> {
        let state = self.record(MuxCall::SessionPid(name.to_string()))?;
        Ok(state.sessions.get(name).cloned().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_moves_session() {
        let mux = InMemoryMultiplexer::with_sessions(["gt-niflheim-witness"]);
        mux.rename_session("gt-niflheim-witness", "nif-witness").unwrap();

        assert!(!mux.has_session("gt-niflheim-witness").unwrap());
        assert!(mux.has_session("nif-witness").unwrap());
        assert_eq!(
            mux.renames(),
            vec![("gt-niflheim-witness".to_string(), "nif-witness".to_string())]
        );
    }

    #[test]
    fn test_rename_onto_existing_fails() {
        let mux = InMemoryMultiplexer::with_sessions(["a-old", "a-new"]);
        assert!(mux.rename_session("a-old", "a-new").is_err());
        assert_eq!(mux.session_names(), vec!["a-new", "a-old"]);
    }

    #[test]
    fn test_unavailable_fails_every_call() {
        let mux = InMemoryMultiplexer::with_sessions(["gt-alpha"]);
        mux.set_unavailable(Some("server exited"));
        assert!(mux.has_session("gt-alpha").is_err());
        assert!(mux.list_sessions().is_err());

        mux.set_unavailable(None);
        assert!(mux.has_session("gt-alpha").unwrap());
    }

    #[test]
    fn test_session_pid() {
        let mux = InMemoryMultiplexer::new();
        mux.add_session("gt-alpha", Some("4242".to_string()));
        mux.add_session("gt-beta", None);

        assert_eq!(mux.session_pid("gt-alpha").unwrap().as_deref(), Some("4242"));
        assert_eq!(mux.session_pid("gt-beta").unwrap(), None);
        assert_eq!(mux.session_pid("gt-gamma").unwrap(), None);
    }
}
