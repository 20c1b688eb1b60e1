// SPDX-License-Identifier: MIT

//! Requests the `herdctl` CLI sends to the daemon's IPC listener.

use serde::{Deserialize, Serialize};

/// One request frame (spec.md §6: "CLI contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Fleet-wide status.
    Status,
    /// Status for a single agent.
    AgentStatus { agent: String },
    /// Job list, optionally scoped to one agent, newest first.
    JobList { agent: Option<String>, limit: Option<usize> },
    /// A single job's full record.
    JobDetail { job_id: String },
    /// Stream a job's message log. `follow` keeps the connection open
    /// and emits new lines as they are appended.
    Logs { job_id: String, follow: bool },
    /// Run an agent immediately, outside its configured schedules.
    Trigger { agent: String, schedule: Option<String>, prompt: Option<String>, wait: bool },
    /// Cancel an in-flight job.
    Cancel { job_id: String, timeout_secs: Option<u64> },
    /// Ask the supervisor to shut down.
    Shutdown { wait_for_jobs: bool, timeout_secs: Option<u64> },
}
