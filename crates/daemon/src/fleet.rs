// SPDX-License-Identifier: MIT

//! The Fleet Manager: composes the Scheduler, Job Executor, and state
//! store into the daemon's single source of truth for read-only views
//! and operator-initiated mutations (spec.md §4.9).
//!
//! Owns the PID file's lifecycle and the shutdown sequence; everything
//! else is read from `herdctl_storage` records or the in-memory
//! [`Scheduler`].

use crate::scheduler::{Scheduler, ShutdownTimeoutError};
use chrono::Utc;
use herdctl_core::{AgentName, Clock, JobId, TriggerType};
use herdctl_engine::ExecuteRequest;
use herdctl_core::JobStatus;
use herdctl_storage::{JobStore, MessageLog, PidFile};
use herdctl_wire::response::{AgentStatusSummary, CancelOutcome, FleetStatusView, JobDetailView, JobSummary, ScheduleSummary};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum FleetManagerError {
    #[error(transparent)]
    Storage(#[from] herdctl_storage::StorageError),
    #[error(transparent)]
    Executor(#[from] herdctl_engine::ExecutorError),
    #[error("another supervisor instance is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("no agent named {0:?} is configured")]
    UnknownAgent(String),
    #[error(transparent)]
    ShutdownTimeout(#[from] ShutdownTimeoutError),
}

pub struct FleetManager<C: Clock> {
    scheduler: Arc<Scheduler<C>>,
    pid_file: PidFile,
    job_store: JobStore,
    message_log: MessageLog,
    shutdown_timeout: Duration,
}

impl<C: Clock> FleetManager<C> {
    pub fn new(
        scheduler: Arc<Scheduler<C>>,
        pid_file: PidFile,
        job_store: JobStore,
        message_log: MessageLog,
        shutdown_timeout: Duration,
    ) -> Self {
        Self { scheduler, pid_file, job_store, message_log, shutdown_timeout }
    }

    /// Lines of a job's message log at or after index `from`, serialized
    /// back to single-line JSON (the wire format `herdctl` prints
    /// verbatim), plus the job's current status so the caller knows
    /// whether to keep following (spec.md §6: "Consumers must tolerate
    /// unknown fields").
    pub fn job_log_lines(&self, job_id: &JobId, from: usize) -> Result<(Vec<String>, Option<JobStatus>), FleetManagerError> {
        let messages = self.message_log.read_all(job_id)?;
        let lines = messages
            .into_iter()
            .skip(from)
            .map(|m| serde_json::to_string(&m).unwrap_or_default())
            .collect();
        let status = self.job_store.read(job_id)?.map(|j| j.status);
        Ok((lines, status))
    }

    /// Write the PID file, refusing to start over a live supervisor
    /// (spec.md §3: the PID file is "present iff the supervisor is
    /// running, modulo crash"). A PID file left behind by a process
    /// that no longer exists is treated as a crash artifact and
    /// overwritten.
    pub fn claim_pid_file(&self) -> Result<(), FleetManagerError> {
        if let Some(existing_pid) = self.pid_file.read()? {
            if process_is_alive(existing_pid) {
                return Err(FleetManagerError::AlreadyRunning(existing_pid));
            }
            tracing::warn!(pid = existing_pid, "found a stale pid file from a crashed supervisor, reclaiming it");
        }
        self.pid_file.write(std::process::id())?;
        Ok(())
    }

    pub fn release_pid_file(&self) -> Result<(), FleetManagerError> {
        self.pid_file.remove()?;
        Ok(())
    }

    pub fn scheduler(&self) -> &Arc<Scheduler<C>> {
        &self.scheduler
    }

    pub fn fleet_status(&self) -> Result<FleetStatusView, FleetManagerError> {
        let snapshot = self.scheduler.status();
        let started_at = snapshot.started_at.unwrap_or_else(Utc::now);

        let mut agents = Vec::new();
        for agent in self.scheduler.agents().iter() {
            match self.agent_status(&agent.name)? {
                Some(summary) => agents.push(summary),
                None => tracing::warn!(agent = %agent.name, "agent vanished from the live snapshot between reads"),
            }
        }
        Ok(FleetStatusView { started_at, agents })
    }

    pub fn agent_status(&self, agent_name: &AgentName) -> Result<Option<AgentStatusSummary>, FleetManagerError> {
        let agents = self.scheduler.agents();
        let Some(agent) = agents.iter().find(|a| &a.name == agent_name) else {
            return Ok(None);
        };

        let jobs = self.job_store.list()?;
        let running_job_count =
            jobs.iter().filter(|j| &j.agent_name == agent_name && !j.status.is_terminal()).count() as u32;
        let last_job_status = jobs.iter().rev().find(|j| &j.agent_name == agent_name).map(|j| j.status);

        let mut schedules = Vec::new();
        for schedule in &agent.schedules {
            let state = self
                .scheduler
                .schedule_runner_state(agent_name, &schedule.name)
                .unwrap_or_else(|_| herdctl_core::ScheduleState::idle());
            schedules.push(ScheduleSummary {
                name: schedule.name.clone(),
                status: state.status.to_string(),
                next_run_at: state.next_run_at,
                last_error: state.last_error,
            });
        }

        Ok(Some(AgentStatusSummary {
            agent: agent_name.to_string(),
            running_job_count,
            last_job_status: last_job_status.map(|s| s.to_string()),
            schedules,
        }))
    }

    pub fn job_list(&self, agent: Option<&str>, limit: Option<usize>) -> Result<Vec<JobSummary>, FleetManagerError> {
        let mut jobs = self.job_store.list()?;
        jobs.reverse(); // newest first
        if let Some(agent) = agent {
            jobs.retain(|j| j.agent_name.as_str() == agent);
        }
        if let Some(limit) = limit {
            jobs.truncate(limit);
        }
        Ok(jobs.into_iter().map(job_summary).collect())
    }

    pub fn job_detail(&self, job_id: &JobId) -> Result<Option<JobDetailView>, FleetManagerError> {
        let Some(job) = self.job_store.read(job_id)? else {
            return Ok(None);
        };
        Ok(Some(JobDetailView {
            summary: job_summary(job.clone()),
            prompt: job.prompt,
            session_id: job.session_id.map(|s| s.to_string()),
            summary_text: job.summary,
        }))
    }

    /// Run `agent_name` immediately, outside its configured schedules
    /// (spec.md §4.9). Unlike a scheduled dispatch this bypasses the
    /// `already_running`/`at_capacity`/`not_due` checks entirely — an
    /// operator-initiated trigger always runs.
    pub async fn trigger(
        &self,
        agent_name: &AgentName,
        schedule_name: Option<String>,
        prompt_override: Option<String>,
        wait: bool,
    ) -> Result<TriggerHandle, FleetManagerError> {
        let agents = self.scheduler.agents();
        let Some(agent) = agents.iter().find(|a| &a.name == agent_name).cloned() else {
            return Err(FleetManagerError::UnknownAgent(agent_name.to_string()));
        };

        let prompt = prompt_override.unwrap_or_else(|| agent.prompt.clone());
        let executor = self.scheduler.executor_for_agent(&agent);
        let cancellation_token = CancellationToken::new();

        let (job_id_tx, job_id_rx) = tokio::sync::oneshot::channel();
        let mut job_id_tx = Some(job_id_tx);
        let scheduler = Arc::clone(&self.scheduler);
        let token_for_cb = cancellation_token.clone();
        let agent_name_for_cb = agent.name.clone();
        let on_job_created: herdctl_engine::JobCreatedCallback = Arc::new(move |job_id| {
            scheduler.track_manual_job(job_id.as_str(), agent_name_for_cb.clone(), token_for_cb.clone());
            if let Some(tx) = job_id_tx.take() {
                let _ = tx.send(job_id.clone());
            }
        });

        let mut request = ExecuteRequest::new((*agent).clone(), prompt, TriggerType::Manual, cancellation_token);
        request.schedule_name = schedule_name;
        request.job_created_callback = Some(on_job_created);

        if wait {
            let result = executor.execute(request).await?;
            self.scheduler.untrack_job(result.job_id.as_str());
            Ok(TriggerHandle::Finished { job_id: result.job_id, success: result.success, exit_reason: result.error.is_none() })
        } else {
            let scheduler = Arc::clone(&self.scheduler);
            tokio::spawn(async move {
                if let Ok(result) = executor.execute(request).await {
                    scheduler.untrack_job(result.job_id.as_str());
                }
            });
            // Step 1 of the Job Executor (spec.md §4.6) runs synchronously
            // before any provider call, so the id is available almost
            // immediately; a dead channel (executor panicked before
            // creating the job) falls back to a placeholder rather than
            // blocking the caller forever.
            let job_id = job_id_rx.await.unwrap_or_else(|_| JobId::from_string("job-unknown"));
            Ok(TriggerHandle::Dispatched { job_id })
        }
    }

    /// Cancel a running job, or report that it already reached a
    /// terminal state (spec.md §5's two-phase contract: signal the
    /// job's token, wait up to `timeout` for it to actually stop, and
    /// only then report `forced`).
    pub async fn cancel(&self, job_id: &JobId, timeout: Duration) -> Result<CancelOutcome, FleetManagerError> {
        match self.scheduler.cancel_job_and_await(job_id.as_str(), timeout).await {
            Some(outcome) => Ok(outcome),
            None => Ok(CancelOutcome::AlreadyStopped),
        }
    }

    /// Graceful termination (spec.md §6: "30s default timeout, second
    /// signal ignored while stopping"). `wait_for_jobs` mirrors the
    /// `Shutdown` request's field; on timeout the remaining jobs' tokens
    /// are cancelled as a hard-kill fallback before the pid file is
    /// released regardless of outcome.
    pub async fn shutdown(&self, wait_for_jobs: bool, timeout: Option<Duration>) -> Result<(), FleetManagerError> {
        let timeout = timeout.unwrap_or(self.shutdown_timeout);
        let result = self.scheduler.stop(wait_for_jobs, timeout).await;
        if let Err(ShutdownTimeoutError { remaining_jobs }) = &result {
            tracing::warn!(remaining_jobs, "shutdown timeout elapsed, cancelling remaining job tokens");
            self.scheduler.cancel_all_running_jobs();
        }
        self.release_pid_file()?;
        result.map_err(FleetManagerError::from)
    }
}

pub enum TriggerHandle {
    Dispatched { job_id: JobId },
    Finished { job_id: JobId, success: bool, exit_reason: bool },
}

fn job_summary(job: herdctl_core::Job) -> JobSummary {
    JobSummary {
        job_id: job.job_id.to_string(),
        agent: job.agent_name.to_string(),
        schedule_name: job.schedule_name,
        trigger_type: trigger_type_str(job.trigger_type).to_string(),
        status: job.status.to_string(),
        exit_reason: job.exit_reason.map(|r| r.to_string()),
        started_at: Some(job.started_at),
        finished_at: job.finished_at,
    }
}

fn trigger_type_str(trigger_type: TriggerType) -> &'static str {
    match trigger_type {
        TriggerType::Manual => "manual",
        TriggerType::Schedule => "schedule",
        TriggerType::Webhook => "webhook",
        TriggerType::Chat => "chat",
        TriggerType::Fork => "fork",
    }
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_factory::RuntimeFactory;
    use crate::scheduler::ExecutorDeps;
    use herdctl_core::{Agent, FakeClock, PermissionMode, RuntimeKind, ToolPermissions};
    use herdctl_engine::{ScheduleRunner, WorkSourceRegistry};
    use herdctl_storage::{HumanLog, MessageLog, ScheduleStateStore, SessionStore, StateRoot};
    use std::path::PathBuf;

    fn sample_agent(name: &str) -> Arc<Agent> {
        Arc::new(Agent {
            name: AgentName::new(name),
            prompt: "work".into(),
            working_dir: None,
            runtime_kind: RuntimeKind::External,
            containerization: None,
            schedules: vec![],
            max_concurrent: 1,
            session_timeout: Duration::from_secs(3600),
            permission_mode: PermissionMode::Default,
            tools: ToolPermissions::default(),
            model: None,
            tool_servers: vec![],
        })
    }

    fn fleet_manager_for(dir: &std::path::Path) -> FleetManager<FakeClock> {
        let root = StateRoot::new(dir);
        let clock = FakeClock::new();
        let schedule_runner = Arc::new(ScheduleRunner::new(ScheduleStateStore::new(root.clone()), WorkSourceRegistry::new(), clock.clone()));
        let runtime_factory = Arc::new(RuntimeFactory {
            external_binary: "does-not-exist-herdctl-agent-cli".into(),
            sessions_root: PathBuf::from(dir).join("sessions"),
            docker_sessions_root: PathBuf::from(dir).join("docker-sessions"),
            container_overrides: Default::default(),
        });
        let executor_deps = ExecutorDeps {
            job_store: JobStore::new(root.clone()),
            session_store: SessionStore::new(root.clone()),
            message_log: MessageLog::new(root.clone()),
            human_log: HumanLog::new(root.clone()),
            clock: clock.clone(),
        };
        let scheduler = Arc::new(crate::scheduler::Scheduler::new(
            vec![sample_agent("alpha")],
            schedule_runner,
            runtime_factory,
            executor_deps,
            clock,
            Duration::from_millis(10),
        ));
        FleetManager::new(
            scheduler,
            PidFile::new(root.clone()),
            JobStore::new(root.clone()),
            MessageLog::new(root),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn claim_pid_file_succeeds_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let fleet = fleet_manager_for(dir.path());
        fleet.claim_pid_file().unwrap();
        assert!(PidFile::new(StateRoot::new(dir.path())).read().unwrap().is_some());
    }

    #[test]
    fn claim_pid_file_reclaims_a_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let fleet = fleet_manager_for(dir.path());
        PidFile::new(StateRoot::new(dir.path())).write(999_999_999).unwrap();
        fleet.claim_pid_file().unwrap();
        let pid = PidFile::new(StateRoot::new(dir.path())).read().unwrap().unwrap();
        assert_eq!(pid, std::process::id());
    }

    #[test]
    fn agent_status_reports_none_for_unknown_agent() {
        let dir = tempfile::tempdir().unwrap();
        let fleet = fleet_manager_for(dir.path());
        assert!(fleet.agent_status(&AgentName::new("nobody")).unwrap().is_none());
    }

    #[tokio::test]
    async fn cancel_on_an_unknown_job_reports_already_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let fleet = fleet_manager_for(dir.path());
        let outcome = fleet.cancel(&JobId::from_string("job-2026-07-27-zzzzzzzz"), Duration::from_millis(10)).await.unwrap();
        assert_eq!(outcome, CancelOutcome::AlreadyStopped);
    }

    #[tokio::test]
    async fn trigger_against_an_unknown_agent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fleet = fleet_manager_for(dir.path());
        let err = fleet.trigger(&AgentName::new("nobody"), None, None, false).await.unwrap_err();
        assert!(matches!(err, FleetManagerError::UnknownAgent(_)));
    }
}
