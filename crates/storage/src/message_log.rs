// SPDX-License-Identifier: MIT

//! Append-only writer/reader for a job's `.jsonl` message log
//! (spec.md §3, §4.1, §8: "the file ends with a newline").

use crate::atomic;
use crate::error::{SerializeError, StorageError};
use crate::paths::StateRoot;
use herdctl_core::{JobId, Message};

#[derive(Debug, Clone)]
pub struct MessageLog {
    root: StateRoot,
}

impl MessageLog {
    pub fn new(root: StateRoot) -> Self {
        Self { root }
    }

    /// Append one message as a single JSON-line record. One call maps
    /// to exactly one line, so callers never batch multiple messages
    /// into one call (spec.md §4.1: "the caller is responsible for
    /// framing").
    pub fn append(&self, job_id: &JobId, message: &Message) -> Result<(), StorageError> {
        let path = self.root.job_log_path(job_id);
        let bytes = serde_json::to_vec(message)
            .map_err(|source| StorageError::Serialize { path: path.clone(), source: SerializeError::from(source) })?;
        atomic::append_line(&path, &bytes)
    }

    /// Read every message recorded for a job, in append order.
    pub fn read_all(&self, job_id: &JobId) -> Result<Vec<Message>, StorageError> {
        let path = self.root.job_log_path(job_id);
        let lines = atomic::read_lines(&path)?;
        lines
            .into_iter()
            .map(|line| {
                serde_json::from_slice(&line)
                    .map_err(|source| StorageError::Deserialize { path: path.clone(), source: SerializeError::from(source) })
            })
            .collect()
    }

    pub fn line_count(&self, job_id: &JobId) -> Result<usize, StorageError> {
        Ok(atomic::read_lines(&self.root.job_log_path(job_id))?.len())
    }
}
