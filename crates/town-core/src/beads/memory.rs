//! In-memory [`BeadStore`] for tests.

use super::{AgentRecord, AgentState, BeadError, BeadStore};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemState {
    records: HashMap<String, AgentRecord>,
    unavailable: Option<String>,
    lookups: Vec<String>,
}

/// Agent records held in memory.
#[derive(Debug, Default)]
pub struct InMemoryBeadStore {
    state: Mutex<MemState>,
}

impl InMemoryBeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn insert(&self, record: AgentRecord) {
        self.lock().records.insert(record.id.clone(), record);
    }

    /// Insert a record with only a state and hook.
    pub fn set_state(&self, bead_id: &str, state: AgentState, hook_bead: Option<&str>) {
        self.insert(AgentRecord {
            id: bead_id.to_string(),
            state,
            hook_bead: hook_bead.map(str::to_string),
            updated_at: None,
        });
    }

    /// Make every lookup fail with `reason` (`None` restores service).
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.lock().unavailable = reason.map(str::to_string);
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lock().lookups.clone()
    }
}

impl BeadStore for InMemoryBeadStore {
    fn agent_record(&self, bead_id: &str) -> Result<Option<AgentRecord>, BeadError> {
        let mut state = self.lock();
        state.lookups.push(bead_id.to_string());
        if let Some(reason) = state.unavailable.clone() {
            return Err(BeadError::Failed {
                command: format!("memory show {bead_id}"),
                stderr: reason,
            });
        }
        Ok(state.records.get(bead_id).cloned())
    }
}
