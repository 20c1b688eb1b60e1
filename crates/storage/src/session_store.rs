// SPDX-License-Identifier: MIT

//! Typed reads/writes for `sessions/<agent-name>.json` (spec.md §6).

use crate::atomic;
use crate::error::{SerializeError, StorageError};
use crate::paths::StateRoot;
use herdctl_core::{AgentName, SessionRecord};

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: StateRoot,
}

impl SessionStore {
    pub fn new(root: StateRoot) -> Self {
        Self { root }
    }

    pub fn write(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let path = self.root.session_record_path(&record.agent_name);
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|source| StorageError::Serialize { path: path.clone(), source: SerializeError::from(source) })?;
        atomic::write(&path, &bytes)
    }

    pub fn read(&self, agent_name: &AgentName) -> Result<Option<SessionRecord>, StorageError> {
        let path = self.root.session_record_path(agent_name);
        match atomic::read(&path)? {
            None => Ok(None),
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|source| StorageError::Deserialize { path, source: SerializeError::from(source) })?;
                Ok(Some(record))
            }
        }
    }

    /// Remove a session record entirely (spec.md §4.6 step 2: "clear
    /// the session record" on detected local expiry).
    pub fn clear(&self, agent_name: &AgentName) -> Result<(), StorageError> {
        let path = self.root.session_record_path(agent_name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(StateRoot::new(dir.path()));
        let agent = AgentName::new("alpha");
        let record = SessionRecord::new(agent.clone(), herdctl_core::SessionId::new("sess-1"), chrono::Utc::now());
        store.write(&record).unwrap();
        let loaded = store.read(&agent).unwrap().unwrap();
        assert_eq!(loaded.session_id.as_str(), "sess-1");
    }

    #[test]
    fn clear_removes_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(StateRoot::new(dir.path()));
        let agent = AgentName::new("alpha");
        let record = SessionRecord::new(agent.clone(), herdctl_core::SessionId::new("sess-1"), chrono::Utc::now());
        store.write(&record).unwrap();
        store.clear(&agent).unwrap();
        assert!(store.read(&agent).unwrap().is_none());
    }

    #[test]
    fn clear_on_missing_record_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(StateRoot::new(dir.path()));
        store.clear(&AgentName::new("ghost")).unwrap();
    }
}
