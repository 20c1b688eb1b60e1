// SPDX-License-Identifier: MIT

//! Responses the daemon's IPC listener sends back to the `herdctl` CLI.
//!
//! A request yields one or more response frames on the same connection;
//! `Logs { follow: true }` and `Trigger { wait: true }` keep streaming
//! `LogLine` frames until a terminal frame (`Done`, `Triggered`, or
//! `Error`) closes the exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub name: String,
    pub status: String,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusSummary {
    pub agent: String,
    pub running_job_count: u32,
    pub last_job_status: Option<String>,
    pub schedules: Vec<ScheduleSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetStatusView {
    pub started_at: DateTime<Utc>,
    pub agents: Vec<AgentStatusSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub agent: String,
    pub schedule_name: Option<String>,
    pub trigger_type: String,
    pub status: String,
    pub exit_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetailView {
    #[serde(flatten)]
    pub summary: JobSummary,
    pub prompt: String,
    pub session_id: Option<String>,
    pub summary_text: Option<String>,
}

/// How a cancellation completed (spec.md §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Graceful,
    Forced,
    AlreadyStopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Response {
    Status(FleetStatusView),
    AgentStatus(AgentStatusSummary),
    Jobs(Vec<JobSummary>),
    Job(JobDetailView),
    /// One line of a streamed job message log.
    LogLine(String),
    /// Terminal frame for a `Logs` exchange that is not following.
    LogsDone,
    /// Terminal frame for `Trigger`: the job's effective outcome.
    Triggered { job_id: String, success: bool, exit_reason: Option<String> },
    Cancelled { outcome: CancelOutcome },
    ShutdownAck,
    Error { message: String },
}
