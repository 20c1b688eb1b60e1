// SPDX-License-Identifier: MIT

//! Typed reads/writes for `jobs/<job-id>.yaml` (spec.md §6).

use crate::atomic;
use crate::error::{SerializeError, StorageError};
use crate::paths::StateRoot;
use herdctl_core::{Job, JobId};

#[derive(Debug, Clone)]
pub struct JobStore {
    root: StateRoot,
}

impl JobStore {
    pub fn new(root: StateRoot) -> Self {
        Self { root }
    }

    pub fn write(&self, job: &Job) -> Result<(), StorageError> {
        let path = self.root.job_record_path(&job.job_id);
        let bytes = serde_yaml::to_vec(job)
            .map_err(|source| StorageError::Serialize { path: path.clone(), source: SerializeError::from(source) })?;
        atomic::write(&path, &bytes)
    }

    pub fn read(&self, job_id: &JobId) -> Result<Option<Job>, StorageError> {
        let path = self.root.job_record_path(job_id);
        match atomic::read(&path)? {
            None => Ok(None),
            Some(bytes) => {
                let job = serde_yaml::from_slice(&bytes)
                    .map_err(|source| StorageError::Deserialize { path, source: SerializeError::from(source) })?;
                Ok(Some(job))
            }
        }
    }

    /// List every job record on disk, for `herdctl jobs` / fleet-status
    /// views. Records that fail to parse are skipped rather than
    /// failing the whole listing (a job file is never mutated by a
    /// second writer, so a parse failure here implies disk corruption
    /// outside this process, not a race).
    pub fn list(&self) -> Result<Vec<Job>, StorageError> {
        let jobs_dir = self.root.as_path().join("jobs");
        let entries = match std::fs::read_dir(&jobs_dir) {
            Ok(entries) => entries,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path: jobs_dir, source }),
        };

        let mut jobs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io { path: jobs_dir.clone(), source })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            if let Some(bytes) = atomic::read(&path)? {
                if let Ok(job) = serde_yaml::from_slice::<Job>(&bytes) {
                    jobs.push(job);
                }
            }
        }
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdctl_core::{AgentName, TriggerType};
    use std::path::PathBuf;

    fn sample_job(job_id: &str) -> Job {
        Job::new_pending(
            JobId::from_string(job_id),
            AgentName::new("alpha"),
            None,
            TriggerType::Manual,
            None,
            "do something".into(),
            PathBuf::from("/dev/null"),
            chrono::Utc::now(),
        )
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(StateRoot::new(dir.path()));
        let job = sample_job("job-2026-07-27-aaaaaaaa");
        store.write(&job).unwrap();
        let loaded = store.read(&job.job_id).unwrap().unwrap();
        assert_eq!(loaded.job_id, job.job_id);
    }

    #[test]
    fn read_missing_job_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(StateRoot::new(dir.path()));
        assert!(store.read(&JobId::from_string("job-2026-07-27-zzzzzzzz")).unwrap().is_none());
    }

    #[test]
    fn list_returns_all_written_jobs_sorted_by_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(StateRoot::new(dir.path()));
        let mut first = sample_job("job-2026-07-27-aaaaaaaa");
        first.started_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        let second = sample_job("job-2026-07-27-bbbbbbbb");
        store.write(&second).unwrap();
        store.write(&first).unwrap();
        let jobs = store.list().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, first.job_id);
    }
}
