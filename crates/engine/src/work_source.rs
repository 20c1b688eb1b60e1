// SPDX-License-Identifier: MIT

//! The Schedule Runner's external-collaborator contract (spec.md §4.7).
//!
//! A `WorkSource` is how a schedule turns a scheduler tick into a
//! concrete unit of work the job's prompt is built around. Fetching an
//! item and later reporting its outcome (`complete` on success,
//! `release` to put it back) are separate calls so the runner can
//! invoke the Job Executor in between without holding the work source
//! open across a job's full duration.

use async_trait::async_trait;
use herdctl_storage::{atomic, StorageError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// One unit of work handed to a schedule's prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum WorkSourceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("work item {0} not found among in-flight items")]
    NotInFlight(String),
}

/// External-collaborator contract a schedule's `work_source` reference
/// resolves to (spec.md §4.7, §9).
#[async_trait]
pub trait WorkSource: Send + Sync {
    async fn fetch(&self) -> Result<Option<WorkItem>, WorkSourceError>;
    async fn complete(&self, id: &str) -> Result<(), WorkSourceError>;
    async fn release(&self, id: &str) -> Result<(), WorkSourceError>;
}

/// The default work source: schedules with no external backlog always
/// see "no work" (spec.md §4.7: "skip with 'no work' otherwise").
pub struct NullWorkSource;

#[async_trait]
impl WorkSource for NullWorkSource {
    async fn fetch(&self) -> Result<Option<WorkItem>, WorkSourceError> {
        Ok(None)
    }

    async fn complete(&self, _id: &str) -> Result<(), WorkSourceError> {
        Ok(())
    }

    async fn release(&self, _id: &str) -> Result<(), WorkSourceError> {
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    #[serde(default)]
    pending: Vec<WorkItem>,
    #[serde(default)]
    in_flight: Vec<WorkItem>,
}

/// A minimal concrete `WorkSource` backed by a single JSON file: a FIFO
/// of pending items, rewritten atomically on every `fetch`/`complete`/
/// `release` (spec.md §4.0 supplement: enough to exercise the
/// fetch/complete/release integration paths without a queueing
/// service in scope).
pub struct FileQueueWorkSource {
    path: PathBuf,
}

impl FileQueueWorkSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Seed the queue with items, replacing any existing content.
    pub fn seed(&self, items: Vec<WorkItem>) -> Result<(), WorkSourceError> {
        self.write(&QueueFile { pending: items, in_flight: Vec::new() })
    }

    fn read(&self) -> Result<QueueFile, WorkSourceError> {
        match atomic::read(&self.path)? {
            None => Ok(QueueFile::default()),
            Some(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
        }
    }

    fn write(&self, queue: &QueueFile) -> Result<(), WorkSourceError> {
        let bytes = serde_json::to_vec_pretty(queue)
            .map_err(|source| StorageError::Serialize { path: self.path.clone(), source: source.into() })?;
        atomic::write(&self.path, &bytes)?;
        Ok(())
    }
}

#[async_trait]
impl WorkSource for FileQueueWorkSource {
    async fn fetch(&self) -> Result<Option<WorkItem>, WorkSourceError> {
        let mut queue = self.read()?;
        let Some(item) = queue.pending.first().cloned() else {
            return Ok(None);
        };
        queue.pending.remove(0);
        queue.in_flight.push(item.clone());
        self.write(&queue)?;
        Ok(Some(item))
    }

    async fn complete(&self, id: &str) -> Result<(), WorkSourceError> {
        let mut queue = self.read()?;
        let before = queue.in_flight.len();
        queue.in_flight.retain(|item| item.id != id);
        if queue.in_flight.len() == before {
            return Err(WorkSourceError::NotInFlight(id.to_string()));
        }
        self.write(&queue)
    }

    async fn release(&self, id: &str) -> Result<(), WorkSourceError> {
        let mut queue = self.read()?;
        let Some(pos) = queue.in_flight.iter().position(|item| item.id == id) else {
            return Err(WorkSourceError::NotInFlight(id.to_string()));
        };
        let item = queue.in_flight.remove(pos);
        queue.pending.insert(0, item);
        self.write(&queue)
    }
}
