// SPDX-License-Identifier: MIT

//! Typed reads/writes for `schedules/<agent>__<schedule>.json` (spec.md §6).

use crate::atomic;
use crate::error::{SerializeError, StorageError};
use crate::paths::StateRoot;
use herdctl_core::{AgentName, ScheduleState};

#[derive(Debug, Clone)]
pub struct ScheduleStateStore {
    root: StateRoot,
}

impl ScheduleStateStore {
    pub fn new(root: StateRoot) -> Self {
        Self { root }
    }

    pub fn write(&self, agent_name: &AgentName, schedule_name: &str, state: &ScheduleState) -> Result<(), StorageError> {
        let path = self.root.schedule_state_path(agent_name, schedule_name);
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|source| StorageError::Serialize { path: path.clone(), source: SerializeError::from(source) })?;
        atomic::write(&path, &bytes)
    }

    pub fn read(&self, agent_name: &AgentName, schedule_name: &str) -> Result<Option<ScheduleState>, StorageError> {
        let path = self.root.schedule_state_path(agent_name, schedule_name);
        match atomic::read(&path)? {
            None => Ok(None),
            Some(bytes) => {
                let state = serde_json::from_slice(&bytes)
                    .map_err(|source| StorageError::Deserialize { path, source: SerializeError::from(source) })?;
                Ok(Some(state))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdctl_core::ScheduleState;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStateStore::new(StateRoot::new(dir.path()));
        let agent = AgentName::new("alpha");
        let mut state = ScheduleState::idle();
        state.last_run_at = Some(chrono::Utc::now());
        store.write(&agent, "nightly", &state).unwrap();
        let loaded = store.read(&agent, "nightly").unwrap().unwrap();
        assert_eq!(loaded.last_run_at, state.last_run_at);
    }

    #[test]
    fn read_missing_state_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStateStore::new(StateRoot::new(dir.path()));
        assert!(store.read(&AgentName::new("alpha"), "nightly").unwrap().is_none());
    }

    #[test]
    fn distinct_schedules_on_the_same_agent_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScheduleStateStore::new(StateRoot::new(dir.path()));
        let agent = AgentName::new("alpha");
        store.write(&agent, "a", &ScheduleState::idle()).unwrap();
        let mut other = ScheduleState::idle();
        other.last_error = Some("boom".into());
        store.write(&agent, "b", &other).unwrap();

        assert!(store.read(&agent, "a").unwrap().unwrap().last_error.is_none());
        assert_eq!(store.read(&agent, "b").unwrap().unwrap().last_error.as_deref(), Some("boom"));
    }
}
