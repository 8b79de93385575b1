//! Warrant execution

use super::{Warrant, WarrantError, WarrantStore};
use crate::identity::target_to_session_name;
use crate::mux::Multiplexer;
use crate::process::{ProcessSignaller, Signal};
use crate::registry::PrefixRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default wait between SIGTERM and SIGKILL.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(2000);

/// Carries out filed warrants.
///
/// Termination order for a live session: SIGTERM to the pane's process group
/// and to the pane process, wait the grace period, SIGKILL to the group, then
/// kill the session itself. A session that is already gone satisfies the
/// warrant without any signal.
pub struct WarrantExecutor {
    store: WarrantStore,
    registry: Arc<PrefixRegistry>,
    mux: Arc<dyn Multiplexer>,
    signaller: Arc<dyn ProcessSignaller>,
    grace: Duration,
}

impl WarrantExecutor {
    pub fn new(
        store: WarrantStore,
        registry: Arc<PrefixRegistry>,
        mux: Arc<dyn Multiplexer>,
        signaller: Arc<dyn ProcessSignaller>,
    ) -> Self {
        Self {
            store,
            registry,
            mux,
            signaller,
            grace: DEFAULT_KILL_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn store(&self) -> &WarrantStore {
        &self.store
    }

    /// Execute the warrant filed against `target` and persist it as executed.
    ///
    /// Already-executed warrants are returned unchanged. On failure the
    /// warrant stays pending so the caller can retry.
    pub fn execute(&self, target: &str) -> Result<Warrant, WarrantError> {
        let warrant = self.store.load(target)?.ok_or_else(|| WarrantError::Missing {
            target: target.to_string(),
        })?;
        if warrant.executed {
            debug!("Warrant {} for {target} already executed", warrant.id);
            return Ok(warrant);
        }

        let session = target_to_session_name(target, &self.registry)?;
        self.terminate_session(&session)?;

        let executed = self.store.mark_executed(target)?;
        info!("Executed warrant {} against {target} ({session})", executed.id);
        Ok(executed)
    }

    fn terminate_session(&self, session: &str) -> Result<(), WarrantError> {
        let Some(pid) = self.mux.session_pid(session)? else {
            debug!("Session {session} already gone");
            return Ok(());
        };

        info!("Terminating session {session} (pane pid {pid})");
        self.signaller.signal_group(&pid, Signal::Term)?;
        self.signaller.signal_pid(&pid, Signal::Term)?;
        if !self.grace.is_zero() {
            std::thread::sleep(self.grace);
        }
        self.signaller.signal_group(&pid, Signal::Kill)?;
        self.mux.kill_session(session)?;
        Ok(())
    }
}
