// SPDX-License-Identifier: MIT

//! The stable on-disk layout under a state root directory (spec.md §6).

use herdctl_core::{AgentName, JobId};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StateRoot(PathBuf);

impl StateRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn fleet_state_path(&self) -> PathBuf {
        self.0.join("state.yaml")
    }

    pub fn pid_file_path(&self) -> PathBuf {
        self.0.join("herdctl.pid")
    }

    pub fn job_record_path(&self, job_id: &JobId) -> PathBuf {
        self.0.join("jobs").join(format!("{job_id}.yaml"))
    }

    pub fn job_log_path(&self, job_id: &JobId) -> PathBuf {
        self.0.join("jobs").join(format!("{job_id}.jsonl"))
    }

    pub fn job_human_log_path(&self, job_id: &JobId) -> PathBuf {
        self.0.join("jobs").join(job_id.as_str()).join("output.log")
    }

    pub fn session_record_path(&self, agent_name: &AgentName) -> PathBuf {
        self.0.join("sessions").join(format!("{agent_name}.json"))
    }

    pub fn schedule_state_path(&self, agent_name: &AgentName, schedule_name: &str) -> PathBuf {
        self.0.join("schedules").join(format!("{agent_name}__{schedule_name}.json"))
    }

    /// Root of the containerized-session log directory; the provider's
    /// own session-directory encoding is applied beneath this (spec.md
    /// §6: "layout mirrors the provider's own session-directory
    /// encoding, with the workspace encoded as `-workspace`").
    pub fn docker_sessions_dir(&self) -> PathBuf {
        self.0.join("docker-sessions")
    }
}
