// SPDX-License-Identifier: MIT

//! The supervisor PID file (spec.md §3: "present iff the supervisor is
//! running (modulo crash)").

use crate::atomic;
use crate::error::StorageError;
use crate::paths::StateRoot;

#[derive(Debug, Clone)]
pub struct PidFile {
    root: StateRoot,
}

impl PidFile {
    pub fn new(root: StateRoot) -> Self {
        Self { root }
    }

    pub fn write(&self, pid: u32) -> Result<(), StorageError> {
        atomic::write(&self.root.pid_file_path(), pid.to_string().as_bytes())
    }

    pub fn read(&self) -> Result<Option<u32>, StorageError> {
        match atomic::read(&self.root.pid_file_path())? {
            None => Ok(None),
            Some(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                Ok(text.trim().parse().ok())
            }
        }
    }

    pub fn remove(&self) -> Result<(), StorageError> {
        let path = self.root.pid_file_path();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}
