// SPDX-License-Identifier: MIT

//! Typed reads/writes for `state.yaml` (spec.md §6).

use crate::atomic;
use crate::error::{SerializeError, StorageError};
use crate::paths::StateRoot;
use herdctl_core::FleetState;

#[derive(Debug, Clone)]
pub struct FleetStateStore {
    root: StateRoot,
}

impl FleetStateStore {
    pub fn new(root: StateRoot) -> Self {
        Self { root }
    }

    pub fn write(&self, state: &FleetState) -> Result<(), StorageError> {
        let path = self.root.fleet_state_path();
        let bytes = serde_yaml::to_vec(state)
            .map_err(|source| StorageError::Serialize { path: path.clone(), source: SerializeError::from(source) })?;
        atomic::write(&path, &bytes)
    }

    pub fn read(&self) -> Result<Option<FleetState>, StorageError> {
        let path = self.root.fleet_state_path();
        match atomic::read(&path)? {
            None => Ok(None),
            Some(bytes) => {
                let state = serde_yaml::from_slice(&bytes)
                    .map_err(|source| StorageError::Deserialize { path, source: SerializeError::from(source) })?;
                Ok(Some(state))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FleetStateStore::new(StateRoot::new(dir.path()));
        let state = FleetState::new(chrono::Utc::now());
        store.write(&state).unwrap();
        let loaded = store.read().unwrap().unwrap();
        assert_eq!(loaded.started_at, state.started_at);
    }

    #[test]
    fn read_before_first_write_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FleetStateStore::new(StateRoot::new(dir.path()));
        assert!(store.read().unwrap().is_none());
    }
}
