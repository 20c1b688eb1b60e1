// SPDX-License-Identifier: MIT

//! Job identifier, state machine, and persisted record (spec.md §3, §4.6).

use crate::ids::{AgentName, JobId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What caused a job to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Schedule,
    Webhook,
    Chat,
    Fork,
}

/// A job's position in the `Pending → Running → {Completed, Failed,
/// Cancelled}` DAG (spec.md §3). Transitions only ever move forward;
/// nothing ever re-enters `Pending` or `Running` once terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Why a job reached a terminal state (spec.md §3, classified in §4.6
/// step 7 from the terminating condition of the message stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Success,
    EndTurn,
    StopSequence,
    MaxTurns,
    Timeout,
    Interrupt,
    Error,
    Cancelled,
}

impl ExitReason {
    /// Classify a terminating error message per spec.md §4.6 step 7's
    /// substring heuristics, evaluated in the order the spec lists them.
    pub fn classify_error(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("timeout") {
            ExitReason::Timeout
        } else if lower.contains("abort") || lower.contains("cancel") {
            ExitReason::Cancelled
        } else if lower.contains("maximum turns") {
            ExitReason::MaxTurns
        } else {
            ExitReason::Error
        }
    }
}

crate::simple_display! {
    ExitReason {
        Success => "success",
        EndTurn => "end_turn",
        StopSequence => "stop_sequence",
        MaxTurns => "max_turns",
        Timeout => "timeout",
        Interrupt => "interrupt",
        Error => "error",
        Cancelled => "cancelled",
    }
}

/// Whether an error's message suggests the caller could usefully retry
/// (spec.md §4.6: "informational only — the Executor itself does not
/// auto-retry except for the single session-expiry case").
pub fn is_recoverable_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("retry")
}

/// Whether an error message signals server-side session expiry
/// (spec.md §4.6 step 6 / §7 `SessionExpired`).
pub fn is_session_expired_error(message: &str) -> bool {
    message.to_ascii_lowercase().contains("session expired")
}

/// A persisted job record (spec.md §3). Owned exclusively by the Job
/// Executor; no other component mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub agent_name: AgentName,
    pub schedule_name: Option<String>,
    pub trigger_type: TriggerType,
    pub status: JobStatus,
    pub exit_reason: Option<ExitReason>,
    pub session_id: Option<SessionId>,
    pub forked_from: Option<JobId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub prompt: String,
    pub summary: Option<String>,
    pub output_path: PathBuf,
}

impl Job {
    /// Construct a new pending job. `fork_source` overrides `trigger_type`
    /// to `Fork` unconditionally (spec.md §4.6 step 1).
    #[allow(clippy::too_many_arguments)]
    pub fn new_pending(
        job_id: JobId,
        agent_name: AgentName,
        schedule_name: Option<String>,
        trigger_type: TriggerType,
        forked_from: Option<JobId>,
        prompt: String,
        output_path: PathBuf,
        started_at: DateTime<Utc>,
    ) -> Self {
        let trigger_type = if forked_from.is_some() { TriggerType::Fork } else { trigger_type };
        Self {
            job_id,
            agent_name,
            schedule_name,
            trigger_type,
            status: JobStatus::Pending,
            exit_reason: None,
            session_id: None,
            forked_from,
            started_at,
            finished_at: None,
            duration_seconds: None,
            prompt,
            summary: None,
            output_path,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
    }

    /// Finalize the job. `duration_seconds` is rounded to the nearest
    /// second per spec.md §8's `round(finished_at − started_at)` property,
    /// while still stored as a float for sub-second precision in the
    /// underlying record.
    pub fn finalize(
        &mut self,
        status: JobStatus,
        exit_reason: ExitReason,
        finished_at: DateTime<Utc>,
        session_id: Option<SessionId>,
        summary: Option<String>,
    ) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.exit_reason = Some(exit_reason);
        self.finished_at = Some(finished_at);
        let elapsed = (finished_at - self.started_at).num_milliseconds().max(0) as f64 / 1000.0;
        self.duration_seconds = Some(elapsed.round());
        if session_id.is_some() {
            self.session_id = session_id;
        }
        self.summary = summary;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_error_matches_spec_substrings() {
        assert_eq!(ExitReason::classify_error("request timeout"), ExitReason::Timeout);
        assert_eq!(ExitReason::classify_error("operation aborted"), ExitReason::Cancelled);
        assert_eq!(ExitReason::classify_error("user cancelled"), ExitReason::Cancelled);
        assert_eq!(ExitReason::classify_error("maximum turns exceeded"), ExitReason::MaxTurns);
        assert_eq!(ExitReason::classify_error("something broke"), ExitReason::Error);
    }

    #[test]
    fn recoverable_error_detection() {
        assert!(is_recoverable_error("429 rate limit exceeded"));
        assert!(is_recoverable_error("please retry later"));
        assert!(!is_recoverable_error("invalid api key"));
    }

    #[test]
    fn session_expired_detection_is_case_insensitive() {
        assert!(is_session_expired_error("Session expired"));
        assert!(is_session_expired_error("session expired on server"));
        assert!(!is_session_expired_error("session active"));
    }

    #[test]
    fn new_pending_overrides_trigger_type_when_forked() {
        let job = Job::new_pending(
            JobId::from_string("job-2026-07-27-aaaaaaaa"),
            AgentName::new("alpha"),
            None,
            TriggerType::Manual,
            Some(JobId::from_string("job-2026-07-26-bbbbbbbb")),
            "do it again".into(),
            PathBuf::from("/tmp/jobs/job-2026-07-27-aaaaaaaa.yaml"),
            Utc::now(),
        );
        assert_eq!(job.trigger_type, TriggerType::Fork);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn finalize_rounds_duration_to_nearest_second() {
        let started = Utc::now();
        let mut job = Job::new_pending(
            JobId::from_string("job-2026-07-27-aaaaaaaa"),
            AgentName::new("alpha"),
            None,
            TriggerType::Manual,
            None,
            "x".into(),
            PathBuf::from("/tmp/x.yaml"),
            started,
        );
        job.mark_running();
        let finished = started + chrono::Duration::milliseconds(2600);
        job.finalize(JobStatus::Completed, ExitReason::Success, finished, None, None);
        assert_eq!(job.duration_seconds, Some(3.0));
        assert!(job.finished_at.unwrap() >= job.started_at);
    }
}
