// SPDX-License-Identifier: MIT

//! The Schedule Runner: turns one scheduler tick into a job (spec.md §4.7).
//!
//! Deciding *whether* a schedule is due is the Scheduler's job (that
//! lives in `herdctl-daemon`, which owns the polling loop and the
//! clock-driven `ScheduleCheckResult` skip reasons). This module only
//! knows how to run a schedule that has already been selected: fetch
//! work if any is configured, build the prompt, drive the Job
//! Executor, report the outcome back to the work source, and persist
//! the schedule's next due time.

use crate::executor::{ExecuteRequest, Executor, JobCreatedCallback, RunResult};
use crate::work_source::{WorkSource, WorkSourceError};
use herdctl_core::{Agent, AgentName, Clock, Schedule, ScheduleKind, ScheduleState, ScheduleStatus, TriggerType};
use herdctl_storage::{ScheduleStateStore, StorageError};
use herdctl_trigger::CronSchedule;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ScheduleRunnerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    WorkSource(#[from] WorkSourceError),
    #[error(transparent)]
    Executor(#[from] crate::executor::ExecutorError),
    #[error("schedule {0:?} has no interval/cron cadence and cannot compute a next run time")]
    NotScheduled(String),
    #[error("invalid cron expression on schedule {0:?}: {1}")]
    InvalidCron(String, String),
}

/// Why a tick produced no job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A `work_source` was configured but it reported no pending item.
    NoWork,
}

/// Outcome of one `run_once` call.
pub enum ScheduleTickOutcome {
    Skipped(SkipReason),
    Ran(RunResult),
}

/// Registry of named external work sources, keyed by the name a
/// schedule's `work_source` reference points at (spec.md §4.7).
pub type WorkSourceRegistry = HashMap<String, Arc<dyn WorkSource>>;

pub struct ScheduleRunner<C: Clock> {
    state_store: ScheduleStateStore,
    work_sources: WorkSourceRegistry,
    clock: C,
}

impl<C: Clock> ScheduleRunner<C> {
    pub fn new(state_store: ScheduleStateStore, work_sources: WorkSourceRegistry, clock: C) -> Self {
        Self { state_store, work_sources, clock }
    }

    pub fn state_for(&self, agent_name: &AgentName, schedule_name: &str) -> Result<ScheduleState, ScheduleRunnerError> {
        Ok(self.state_store.read(agent_name, schedule_name)?.unwrap_or_else(ScheduleState::idle))
    }

    /// Run `schedule` for `agent` exactly once: the Scheduler has
    /// already decided this schedule is due. `on_job_created`, when
    /// set, is forwarded to the Job Executor so a caller that does not
    /// itself generate job ids (the Scheduler) can still learn one as
    /// soon as it exists (spec.md §4.8's `job_id → running-job handle`
    /// map).
    pub async fn run_once(
        &self,
        agent: &Agent,
        schedule: &Schedule,
        executor: &Executor<C>,
        cancellation_token: CancellationToken,
        on_job_created: Option<JobCreatedCallback>,
    ) -> Result<ScheduleTickOutcome, ScheduleRunnerError> {
        let mut state = self.state_for(&agent.name, &schedule.name)?;
        state.status = ScheduleStatus::Running;
        self.state_store.write(&agent.name, &schedule.name, &state)?;

        let item = match &schedule.work_source {
            None => None,
            // An unregistered work source behaves like one with no
            // pending items rather than failing the tick.
            Some(work_source_ref) => match self.work_sources.get(&work_source_ref.name) {
                None => None,
                Some(source) => source.fetch().await?,
            },
        };

        if schedule.work_source.is_some() && item.is_none() {
            let now = self.clock.now();
            state.status = ScheduleStatus::Idle;
            state.next_run_at = Some(self.compute_next_run_at(schedule, state.last_run_at, now)?);
            self.state_store.write(&agent.name, &schedule.name, &state)?;
            return Ok(ScheduleTickOutcome::Skipped(SkipReason::NoWork));
        }

        let prompt = match &item {
            Some(item) => schedule.prompt_template.replace("{{item}}", &item.description),
            None => schedule.prompt_template.clone(),
        };

        let mut request = ExecuteRequest::new(agent.clone(), prompt, TriggerType::Schedule, cancellation_token);
        request.schedule_name = Some(schedule.name.clone());
        request.job_created_callback = on_job_created;
        let result = executor.execute(request).await?;

        if let (Some(work_source_ref), Some(item)) = (&schedule.work_source, &item) {
            if let Some(source) = self.work_sources.get(&work_source_ref.name) {
                let outcome = if result.success { source.complete(&item.id).await } else { source.release(&item.id).await };
                if let Err(e) = outcome {
                    tracing::warn!(schedule = %schedule.name, item = %item.id, error = %e, "failed to report work item outcome");
                }
            }
        }

        let now = self.clock.now();
        state.status = ScheduleStatus::Idle;
        state.last_run_at = Some(now);
        state.last_error = result.error.clone();
        state.next_run_at = Some(self.compute_next_run_at(schedule, Some(now), now)?);
        self.state_store.write(&agent.name, &schedule.name, &state)?;

        Ok(ScheduleTickOutcome::Ran(result))
    }

    fn compute_next_run_at(
        &self,
        schedule: &Schedule,
        last_completed_at: Option<chrono::DateTime<chrono::Utc>>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<chrono::DateTime<chrono::Utc>, ScheduleRunnerError> {
        match &schedule.kind {
            ScheduleKind::Interval { interval, jitter_percent } => {
                Ok(herdctl_trigger::next_trigger_at(last_completed_at, *interval, *jitter_percent, now))
            }
            ScheduleKind::Cron { expression } => {
                let parsed = CronSchedule::parse(expression)
                    .map_err(|e| ScheduleRunnerError::InvalidCron(schedule.name.clone(), e.to_string()))?;
                Ok(parsed.next_after(now).unwrap_or(now))
            }
            ScheduleKind::Webhook | ScheduleKind::Chat => Err(ScheduleRunnerError::NotScheduled(schedule.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_source::FileQueueWorkSource;
    use herdctl_core::{FakeClock, PermissionMode, RuntimeKind, ToolPermissions, WorkSourceRef};
    use herdctl_runtime::{MessageStream, Runtime, RuntimeInitError};
    use herdctl_storage::{HumanLog, JobStore, MessageLog, SessionStore, StateRoot};
    use serde_json::json;
    use std::time::Duration;

    struct ScriptedRuntime;

    #[async_trait::async_trait]
    impl Runtime for ScriptedRuntime {
        async fn run(&self, _request: herdctl_runtime::RunRequest) -> Result<MessageStream, RuntimeInitError> {
            let (tx, rx) = tokio::sync::mpsc::channel(8);
            tokio::spawn(async move {
                let _ = tx.send(json!({"type": "assistant", "content": "done", "summary": "done", "partial": false})).await;
                let _ = tx.send(json!({"type": "system", "subtype": "end", "content": "done"})).await;
            });
            Ok(tokio_stream::wrappers::ReceiverStream::new(rx))
        }
    }

    fn sample_agent() -> Agent {
        Agent {
            name: AgentName::new("alpha"),
            prompt: "base".into(),
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
        }
    }

    fn sample_executor(dir: &std::path::Path) -> Executor<FakeClock> {
        let root = StateRoot::new(dir);
        Executor::new(
            JobStore::new(root.clone()),
            SessionStore::new(root.clone()),
            MessageLog::new(root.clone()),
            HumanLog::new(root),
            Arc::new(ScriptedRuntime),
            FakeClock::new(),
        )
    }

    #[tokio::test]
    async fn interval_schedule_without_work_source_always_runs() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let runner = ScheduleRunner::new(ScheduleStateStore::new(StateRoot::new(state_dir.path())), HashMap::new(), FakeClock::new());
        let executor = sample_executor(dir.path());
        let agent = sample_agent();
        let schedule = Schedule {
            name: "nightly".into(),
            kind: ScheduleKind::Interval { interval: Duration::from_secs(60), jitter_percent: None },
            prompt_template: "do the nightly thing".into(),
            work_source: None,
        };

        let outcome = runner.run_once(&agent, &schedule, &executor, CancellationToken::new(), None).await.unwrap();
        match outcome {
            ScheduleTickOutcome::Ran(result) => assert!(result.success),
            ScheduleTickOutcome::Skipped(_) => panic!("expected the schedule to run"),
        }

        let state = runner.state_for(&agent.name, "nightly").unwrap();
        assert_eq!(state.status, ScheduleStatus::Idle);
        assert!(state.last_run_at.is_some());
        assert!(state.next_run_at.is_some());
    }

    #[tokio::test]
    async fn empty_work_source_skips_without_running_the_executor() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let queue_path = dir.path().join("queue.json");
        let source: Arc<dyn WorkSource> = Arc::new(FileQueueWorkSource::new(&queue_path));

        let mut work_sources: WorkSourceRegistry = HashMap::new();
        work_sources.insert("queue".to_string(), source);

        let runner = ScheduleRunner::new(ScheduleStateStore::new(StateRoot::new(state_dir.path())), work_sources, FakeClock::new());
        let executor = sample_executor(dir.path());
        let agent = sample_agent();
        let schedule = Schedule {
            name: "drain".into(),
            kind: ScheduleKind::Interval { interval: Duration::from_secs(60), jitter_percent: None },
            prompt_template: "handle {{item}}".into(),
            work_source: Some(WorkSourceRef { name: "queue".into() }),
        };

        let outcome = runner.run_once(&agent, &schedule, &executor, CancellationToken::new(), None).await.unwrap();
        assert!(matches!(outcome, ScheduleTickOutcome::Skipped(SkipReason::NoWork)));
    }

    #[tokio::test]
    async fn cron_schedule_computes_next_run_from_expression() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let runner = ScheduleRunner::new(ScheduleStateStore::new(StateRoot::new(state_dir.path())), HashMap::new(), FakeClock::new());
        let executor = sample_executor(dir.path());
        let agent = sample_agent();
        let schedule = Schedule {
            name: "hourly".into(),
            kind: ScheduleKind::Cron { expression: "@hourly".into() },
            prompt_template: "hourly check".into(),
            work_source: None,
        };

        runner.run_once(&agent, &schedule, &executor, CancellationToken::new(), None).await.unwrap();
        let state = runner.state_for(&agent.name, "hourly").unwrap();
        let next = state.next_run_at.unwrap();
        let last = state.last_run_at.unwrap();
        assert!(next > last);
        assert!((next - last) <= chrono::Duration::hours(1));
    }
}
