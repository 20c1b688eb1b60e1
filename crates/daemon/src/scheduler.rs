// SPDX-License-Identifier: MIT

//! The Scheduler: the polling loop that decides when a schedule is due
//! and hands it to the Schedule Runner (spec.md §4.8).
//!
//! Deciding whether a (agent, schedule) pair fires belongs here; running
//! it once it has been decided belongs to `herdctl_engine::ScheduleRunner`.
//! The two in-memory maps this type owns — `running_schedules` and
//! `running_jobs` — are exactly the ones spec.md §4.8 names: the first
//! prevents a schedule from being dispatched twice while its previous
//! run is still in flight, the second is what `stop` and a `cancel`
//! request walk.

use crate::runtime_factory::RuntimeFactory;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use herdctl_core::{Agent, AgentName, Clock, Schedule, ScheduleStatus};
use herdctl_engine::{Executor, JobCreatedCallback, ScheduleRunner, ScheduleTickOutcome};
use herdctl_wire::CancelOutcome;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Raised by [`Scheduler::stop`] when jobs remain running once the
/// shutdown timeout elapses (spec.md §7).
#[derive(Debug, Error)]
#[error("shutdown timed out with {remaining_jobs} job(s) still running")]
pub struct ShutdownTimeoutError {
    pub remaining_jobs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Stopped,
    Running,
    Stopping,
}

herdctl_core::simple_display! {
    SchedulerStatus {
        Stopped => "stopped",
        Running => "running",
        Stopping => "stopping",
    }
}

/// Why a (agent, schedule) pair was not dispatched on a given tick
/// (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSkipReason {
    UnsupportedType,
    Disabled,
    AlreadyRunning,
    AtCapacity,
    NotDue,
}

enum ScheduleCheckResult {
    Trigger,
    Skip(ScheduleSkipReason),
}

/// A snapshot of the Scheduler's state-machine fields, for read-only
/// status views (spec.md §4.9).
#[derive(Debug, Clone)]
pub struct SchedulerStatusSnapshot {
    pub status: SchedulerStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub check_count: u64,
    pub trigger_count: u64,
    pub last_check_at: Option<DateTime<Utc>>,
    pub running_job_count: usize,
}

struct RunningJob {
    agent_name: AgentName,
    cancellation_token: CancellationToken,
}

pub struct Scheduler<C: Clock> {
    agents: ArcSwap<Vec<Arc<Agent>>>,
    executors: Mutex<HashMap<AgentName, Arc<Executor<C>>>>,
    schedule_runner: Arc<ScheduleRunner<C>>,
    runtime_factory: Arc<RuntimeFactory>,
    executor_deps: ExecutorDeps<C>,
    clock: C,
    check_interval: Duration,

    status: Mutex<SchedulerStatus>,
    started_at: Mutex<Option<DateTime<Utc>>>,
    check_count: AtomicU64,
    trigger_count: AtomicU64,
    last_check_at: Mutex<Option<DateTime<Utc>>>,

    running_schedules: Mutex<HashSet<(AgentName, String)>>,
    running_jobs: Arc<Mutex<HashMap<String, RunningJob>>>,

    loop_cancellation: CancellationToken,
}

/// The stores every per-agent [`Executor`] is built from; identical for
/// every agent, only the `Runtime` differs (spec.md §4.6).
pub struct ExecutorDeps<C: Clock> {
    pub job_store: herdctl_storage::JobStore,
    pub session_store: herdctl_storage::SessionStore,
    pub message_log: herdctl_storage::MessageLog,
    pub human_log: herdctl_storage::HumanLog,
    pub clock: C,
}

impl<C: Clock> Clone for ExecutorDeps<C> {
    fn clone(&self) -> Self {
        Self {
            job_store: self.job_store.clone(),
            session_store: self.session_store.clone(),
            message_log: self.message_log.clone(),
            human_log: self.human_log.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn new(
        agents: Vec<Arc<Agent>>,
        schedule_runner: Arc<ScheduleRunner<C>>,
        runtime_factory: Arc<RuntimeFactory>,
        executor_deps: ExecutorDeps<C>,
        clock: C,
        check_interval: Duration,
    ) -> Self {
        Self {
            agents: ArcSwap::new(Arc::new(agents)),
            executors: Mutex::new(HashMap::new()),
            schedule_runner,
            runtime_factory,
            executor_deps,
            clock,
            check_interval,
            status: Mutex::new(SchedulerStatus::Stopped),
            started_at: Mutex::new(None),
            check_count: AtomicU64::new(0),
            trigger_count: AtomicU64::new(0),
            last_check_at: Mutex::new(None),
            running_schedules: Mutex::new(HashSet::new()),
            running_jobs: Arc::new(Mutex::new(HashMap::new())),
            loop_cancellation: CancellationToken::new(),
        }
    }

    pub fn status(&self) -> SchedulerStatusSnapshot {
        SchedulerStatusSnapshot {
            status: *self.status.lock(),
            started_at: *self.started_at.lock(),
            check_count: self.check_count.load(Ordering::Relaxed),
            trigger_count: self.trigger_count.load(Ordering::Relaxed),
            last_check_at: *self.last_check_at.lock(),
            running_job_count: self.running_jobs.lock().len(),
        }
    }

    /// Atomically replace the agent list the scheduler polls. In-flight
    /// jobs for agents no longer present keep running to completion;
    /// only future ticks stop considering them (spec.md §4.8:
    /// "set_agents(new_list) atomic hot-swap").
    pub fn set_agents(&self, agents: Vec<Arc<Agent>>) {
        self.agents.store(Arc::new(agents));
        self.executors.lock().clear();
    }

    pub fn agents(&self) -> Arc<Vec<Arc<Agent>>> {
        self.agents.load_full()
    }

    /// Cancel the running job with `job_id`, if any. Returns whether a
    /// running job was found.
    pub fn cancel_job(&self, job_id: &str) -> bool {
        if let Some(job) = self.running_jobs.lock().get(job_id) {
            job.cancellation_token.cancel();
            true
        } else {
            false
        }
    }

    /// Cancel every currently-tracked job's token, without waiting for
    /// any of them to actually stop (the hard-kill fallback `shutdown`
    /// falls back to once its own wait timeout has already elapsed,
    /// spec.md §7).
    pub fn cancel_all_running_jobs(&self) {
        for job in self.running_jobs.lock().values() {
            job.cancellation_token.cancel();
        }
    }

    /// The two-phase cancellation contract (spec.md §5, §8 scenario 6):
    /// signal `job_id`'s token, then wait up to `timeout` for the
    /// runtime to actually stop (observed as the job leaving
    /// `running_jobs`). Returns `None` if the job was not tracked at
    /// all, so the caller can distinguish "already stopped" from an
    /// escalation.
    pub async fn cancel_job_and_await(&self, job_id: &str, timeout: Duration) -> Option<CancelOutcome> {
        if !self.cancel_job(job_id) {
            return None;
        }
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.running_jobs.lock().contains_key(job_id) {
                return Some(CancelOutcome::Graceful);
            }
            if tokio::time::Instant::now() >= deadline {
                return Some(CancelOutcome::Forced);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub fn running_job_agent(&self, job_id: &str) -> Option<AgentName> {
        self.running_jobs.lock().get(job_id).map(|j| j.agent_name.clone())
    }

    /// Read a (agent, schedule) pair's persisted `ScheduleState`, for
    /// the Fleet Manager's read-only status views (spec.md §4.9). A
    /// thin pass-through to the `ScheduleRunner`, which owns the store.
    pub fn schedule_runner_state(
        &self,
        agent_name: &AgentName,
        schedule_name: &str,
    ) -> Result<herdctl_core::ScheduleState, herdctl_engine::ScheduleRunnerError> {
        self.schedule_runner.state_for(agent_name, schedule_name)
    }

    /// The main polling loop. Runs until [`Scheduler::stop`] cancels it.
    pub async fn run(self: &Arc<Self>) {
        *self.status.lock() = SchedulerStatus::Running;
        *self.started_at.lock() = Some(self.clock.now());

        loop {
            if self.loop_cancellation.is_cancelled() {
                break;
            }

            self.tick().await;
            *self.last_check_at.lock() = Some(self.clock.now());
            self.check_count.fetch_add(1, Ordering::Relaxed);

            tokio::select! {
                _ = self.loop_cancellation.cancelled() => break,
                _ = tokio::time::sleep(self.check_interval) => {}
            }
        }
    }

    async fn tick(self: &Arc<Self>) {
        let agents = self.agents.load_full();
        for agent in agents.iter() {
            for schedule in &agent.schedules {
                match self.evaluate(agent, schedule) {
                    ScheduleCheckResult::Trigger => self.dispatch(Arc::clone(agent), schedule.clone()).await,
                    ScheduleCheckResult::Skip(reason) => {
                        tracing::trace!(agent = %agent.name, schedule = %schedule.name, ?reason, "schedule skipped");
                    }
                }
            }
        }
    }

    fn evaluate(&self, agent: &Agent, schedule: &Schedule) -> ScheduleCheckResult {
        if !schedule.kind.is_scheduler_driven() {
            return ScheduleCheckResult::Skip(ScheduleSkipReason::UnsupportedType);
        }

        let state = match self.schedule_runner.state_for(&agent.name, &schedule.name) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(agent = %agent.name, schedule = %schedule.name, error = %e, "failed to read schedule state, skipping this tick");
                return ScheduleCheckResult::Skip(ScheduleSkipReason::NotDue);
            }
        };
        if state.status == ScheduleStatus::Disabled {
            return ScheduleCheckResult::Skip(ScheduleSkipReason::Disabled);
        }

        let key = (agent.name.clone(), schedule.name.clone());
        if self.running_schedules.lock().contains(&key) {
            return ScheduleCheckResult::Skip(ScheduleSkipReason::AlreadyRunning);
        }

        let running_for_agent = self.running_jobs.lock().values().filter(|job| job.agent_name == agent.name).count() as u32;
        if running_for_agent >= agent.max_concurrent {
            return ScheduleCheckResult::Skip(ScheduleSkipReason::AtCapacity);
        }

        if !state.is_due(self.clock.now()) {
            return ScheduleCheckResult::Skip(ScheduleSkipReason::NotDue);
        }

        ScheduleCheckResult::Trigger
    }

    fn executor_for(&self, agent: &Agent) -> Arc<Executor<C>> {
        if let Some(existing) = self.executors.lock().get(&agent.name) {
            return Arc::clone(existing);
        }

        let runtime: Arc<dyn herdctl_runtime::Runtime> = match self.runtime_factory.build(agent) {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(agent = %agent.name, error = %e, "failed to build runtime, scheduled runs for this agent will keep failing");
                // Fall back to a runtime that always fails fast, rather
                // than panicking the scheduler loop over one bad agent.
                Arc::new(crate::runtime_factory::always_failing_runtime(e.to_string()))
            }
        };

        let deps = self.executor_deps.clone();
        let executor = Arc::new(Executor::new(deps.job_store, deps.session_store, deps.message_log, deps.human_log, runtime, deps.clock));
        self.executors.lock().insert(agent.name.clone(), Arc::clone(&executor));
        executor
    }

    async fn dispatch(self: &Arc<Self>, agent: Arc<Agent>, schedule: Schedule) {
        let key = (agent.name.clone(), schedule.name.clone());
        self.running_schedules.lock().insert(key.clone());
        self.trigger_count.fetch_add(1, Ordering::Relaxed);

        let executor = self.executor_for(&agent);
        let job_token = CancellationToken::new();

        let running_jobs_for_cb = Arc::clone(&self.running_jobs);
        let agent_name_for_cb = agent.name.clone();
        let token_for_cb = job_token.clone();
        let on_job_created: JobCreatedCallback = Arc::new(move |job_id| {
            running_jobs_for_cb.lock().insert(
                job_id.to_string(),
                RunningJob { agent_name: agent_name_for_cb.clone(), cancellation_token: token_for_cb.clone() },
            );
        });

        let schedule_runner = Arc::clone(&self.schedule_runner);
        let scheduler = Arc::clone(self);
        let agent_for_task = Arc::clone(&agent);
        let schedule_for_task = schedule.clone();

        tokio::spawn(async move {
            let outcome = schedule_runner
                .run_once(&agent_for_task, &schedule_for_task, &executor, job_token, Some(on_job_created))
                .await;

            match outcome {
                Ok(ScheduleTickOutcome::Ran(result)) => {
                    scheduler.running_jobs.lock().remove(result.job_id.as_str());
                }
                Ok(ScheduleTickOutcome::Skipped(_)) => {}
                Err(e) => {
                    tracing::warn!(agent = %agent_for_task.name, schedule = %schedule_for_task.name, error = %e, "schedule runner failed");
                }
            }

            scheduler.running_schedules.lock().remove(&(agent_for_task.name.clone(), schedule_for_task.name.clone()));
        });
    }

    /// Manually trigger `agent` outside of the normal polling loop,
    /// bypassing the `already_running`/`at_capacity`/`not_due` checks
    /// that only apply to scheduled dispatch (spec.md §4.9: operator-
    /// initiated `trigger`). Returns the job's cancellation handle's id
    /// via the `job_created_callback` baked into `request`.
    pub fn executor_for_agent(&self, agent: &Agent) -> Arc<Executor<C>> {
        self.executor_for(agent)
    }

    pub fn track_manual_job(&self, job_id: &str, agent_name: AgentName, cancellation_token: CancellationToken) {
        self.running_jobs.lock().insert(job_id.to_string(), RunningJob { agent_name, cancellation_token });
    }

    pub fn untrack_job(&self, job_id: &str) {
        self.running_jobs.lock().remove(job_id);
    }

    /// Stop the polling loop. If `wait_for_jobs`, poll the in-memory job
    /// map until it drains or `timeout` elapses; either way `status`
    /// becomes `Stopped` before returning (spec.md §4.8).
    pub async fn stop(&self, wait_for_jobs: bool, timeout: Duration) -> Result<(), ShutdownTimeoutError> {
        *self.status.lock() = SchedulerStatus::Stopping;
        self.loop_cancellation.cancel();

        if wait_for_jobs {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let remaining = self.running_jobs.lock().len();
                if remaining == 0 {
                    break;
                }
                if tokio::time::Instant::now() >= deadline {
                    *self.status.lock() = SchedulerStatus::Stopped;
                    return Err(ShutdownTimeoutError { remaining_jobs: remaining });
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }

        *self.status.lock() = SchedulerStatus::Stopped;
        Ok(())
    }
}
