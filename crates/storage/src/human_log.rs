// SPDX-License-Identifier: MIT

//! Optional human-readable per-job log (spec.md §4.6 step 5, §8:
//! "each line is prefixed by an ISO-8601 timestamp in square
//! brackets"). Only created when the executor's `should_write_human_log`
//! flag is set; absent otherwise.

use crate::atomic;
use crate::error::StorageError;
use crate::paths::StateRoot;
use chrono::{DateTime, Utc};
use herdctl_core::JobId;

#[derive(Debug, Clone)]
pub struct HumanLog {
    root: StateRoot,
}

impl HumanLog {
    pub fn new(root: StateRoot) -> Self {
        Self { root }
    }

    pub fn append(&self, job_id: &JobId, at: DateTime<Utc>, line: &str) -> Result<(), StorageError> {
        let path = self.root.job_human_log_path(job_id);
        let formatted = format!("[{}] {}", at.to_rfc3339(), line);
        atomic::append_line(&path, formatted.as_bytes())
    }
}
