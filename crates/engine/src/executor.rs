// SPDX-License-Identifier: MIT

//! The Job Executor: runs exactly one job end-to-end (spec.md §4.6).

use chrono::{DateTime, Utc};
use herdctl_core::{
    is_recoverable_error, is_session_expired_error, Agent, AgentName, ExitReason, Job, JobId, JobStatus, Message,
    SessionId, SessionRecord, TriggerType,
};
use herdctl_message::process;
use herdctl_runtime::{RunRequest, Runtime, RuntimeInitError};
use herdctl_storage::{HumanLog, JobStore, MessageLog, SessionStore, StorageError};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Invoked for every normalized message a job emits. A panic inside the
/// callback is caught and discarded (spec.md §4.6 step 5: a misbehaving
/// observer must never abort the job it is observing).
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Invoked once, synchronously, right after the job record is created
/// (step 1) and before any provider call starts. Lets a caller that does
/// not itself choose the job id — the Job Executor generates it — learn
/// the id early enough to register a cancellation handle or a log
/// subscriber against it (spec.md §4.9: the Fleet Manager's `job_id →
/// running-job handle` map). Panics are caught for the same reason
/// `MessageCallback` panics are: a misbehaving observer must not abort
/// the job it is observing.
pub type JobCreatedCallback = Arc<dyn Fn(&JobId) + Send + Sync>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Inputs to one Job Executor invocation (spec.md §4.6).
pub struct ExecuteRequest {
    pub agent: Agent,
    pub prompt: String,
    pub trigger_type: TriggerType,
    pub schedule_name: Option<String>,
    pub resume_session: Option<SessionId>,
    /// Session to fork from. When set the run always forks — step 2's
    /// resume-validity checks are for session *continuity* and do not
    /// apply to an explicit fork (Open Question resolved: fork takes
    /// priority over resume and bypasses expiry handling).
    pub fork_source: Option<SessionId>,
    pub forked_from: Option<JobId>,
    pub should_write_human_log: bool,
    pub message_callback: Option<MessageCallback>,
    pub job_created_callback: Option<JobCreatedCallback>,
    pub cancellation_token: CancellationToken,
}

impl ExecuteRequest {
    pub fn new(agent: Agent, prompt: impl Into<String>, trigger_type: TriggerType, cancellation_token: CancellationToken) -> Self {
        Self {
            agent,
            prompt: prompt.into(),
            trigger_type,
            schedule_name: None,
            resume_session: None,
            fork_source: None,
            forked_from: None,
            should_write_human_log: false,
            message_callback: None,
            job_created_callback: None,
            cancellation_token,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub message: String,
    pub recoverable: bool,
}

/// Output of one Job Executor invocation (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct RunResult {
    pub job_id: JobId,
    pub success: bool,
    pub session_id: Option<SessionId>,
    pub summary: Option<String>,
    pub duration_seconds: f64,
    pub error: Option<String>,
    pub error_details: Option<ErrorDetails>,
}

pub struct Executor<C: herdctl_core::Clock> {
    job_store: JobStore,
    session_store: SessionStore,
    message_log: MessageLog,
    human_log: HumanLog,
    runtime: Arc<dyn Runtime>,
    clock: C,
}

impl<C: herdctl_core::Clock> Executor<C> {
    pub fn new(
        job_store: JobStore,
        session_store: SessionStore,
        message_log: MessageLog,
        human_log: HumanLog,
        runtime: Arc<dyn Runtime>,
        clock: C,
    ) -> Self {
        Self { job_store, session_store, message_log, human_log, runtime, clock }
    }

    pub async fn execute(&self, request: ExecuteRequest) -> Result<RunResult, ExecutorError> {
        let now = self.clock.now();

        // Step 1: create the pending job record.
        let job_id = JobId::generate(now);
        let mut job = Job::new_pending(
            job_id.clone(),
            request.agent.name.clone(),
            request.schedule_name.clone(),
            request.trigger_type,
            request.forked_from.clone(),
            request.prompt.clone(),
            std::path::PathBuf::from(format!("jobs/{job_id}.jsonl")),
            now,
        );
        self.job_store.write(&job)?;
        tracing::info!(job_id = %job.job_id, agent = %job.agent_name, trigger = ?job.trigger_type, "job created");

        if let Some(cb) = &request.job_created_callback {
            let job_id_for_cb = job_id.clone();
            if std::panic::catch_unwind(AssertUnwindSafe(|| cb(&job_id_for_cb))).is_err() {
                tracing::warn!(job_id = %job_id, "job_created callback panicked, ignoring");
            }
        }

        // Step 2: resolve the session to resume.
        let (mut effective_resume, fork) = if let Some(fork_source) = request.fork_source.clone() {
            (Some(fork_source), true)
        } else {
            (self.resolve_resume(&request, now)?, false)
        };

        // Step 3: transition to running.
        job.mark_running();
        self.job_store.write(&job)?;

        // Steps 4-6: stream, with at most one server-side session-expiry retry.
        let mut retried = false;
        let mut session_id: Option<SessionId> = None;
        let mut summary: Option<String> = None;
        let mut last_error: Option<String> = None;

        loop {
            let run_request = RunRequest::new(request.prompt.clone(), request.agent.clone(), request.cancellation_token.clone())
                .with_resume(effective_resume.clone())
                .with_fork(fork);

            match self.drive_one_attempt(&job_id, run_request, &request.message_callback, request.should_write_human_log).await {
                Ok(attempt) => {
                    if attempt.session_id.is_some() {
                        session_id = attempt.session_id;
                    }
                    if attempt.summary.is_some() {
                        summary = attempt.summary;
                    }
                    last_error = attempt.error;
                }
                Err(init_error) => {
                    last_error = Some(init_error.to_string());
                }
            }

            let should_retry = !retried
                && effective_resume.is_some()
                && last_error.as_deref().is_some_and(is_session_expired_error);
            if !should_retry {
                break;
            }

            tracing::warn!(job_id = %job_id, "session expired server-side, retrying once without resume");
            retried = true;
            self.session_store.clear(&request.agent.name)?;
            let retry_at = self.clock.now();
            self.message_log.append(
                &job_id,
                &Message::System {
                    content: "session expired, retrying with a fresh session".to_string(),
                    subtype: Some("session_retry".to_string()),
                    session_id: None,
                    timestamp: retry_at,
                },
            )?;
            effective_resume = None;
        }

        // Step 7: finalize.
        let finished_at = self.clock.now();
        let (status, exit_reason) = match &last_error {
            None => (JobStatus::Completed, ExitReason::Success),
            Some(message) => (JobStatus::Failed, ExitReason::classify_error(message)),
        };
        job.finalize(status, exit_reason, finished_at, session_id.clone(), summary.clone());
        self.job_store.write(&job)?;

        if let Some(sid) = &session_id {
            self.upsert_session(&request.agent.name, sid, finished_at)?;
        }

        tracing::info!(job_id = %job.job_id, status = %job.status, exit_reason = %exit_reason, duration_s = job.duration_seconds, "job finished");

        let error_details = last_error
            .as_ref()
            .map(|message| ErrorDetails { message: message.clone(), recoverable: is_recoverable_error(message) });

        Ok(RunResult {
            job_id,
            success: status == JobStatus::Completed,
            session_id,
            summary,
            duration_seconds: job.duration_seconds.unwrap_or(0.0),
            error: last_error,
            error_details,
        })
    }

    fn resolve_resume(&self, request: &ExecuteRequest, now: DateTime<Utc>) -> Result<Option<SessionId>, ExecutorError> {
        let Some(resume_id) = request.resume_session.clone() else {
            return Ok(None);
        };
        let Some(record) = self.session_store.read(&request.agent.name)? else {
            // No on-disk record: the id came from elsewhere (e.g. a
            // caller-supplied session id); pass it through verbatim.
            return Ok(Some(resume_id));
        };
        if record.session_id != resume_id {
            return Ok(Some(resume_id));
        }
        if !record.is_locally_valid(now, request.agent.session_timeout) {
            self.session_store.clear(&request.agent.name)?;
            return Ok(None);
        }
        let mut touched = record;
        touched.touch(now);
        self.session_store.write(&touched)?;
        Ok(Some(resume_id))
    }

    fn upsert_session(&self, agent_name: &AgentName, session_id: &SessionId, now: DateTime<Utc>) -> Result<(), ExecutorError> {
        let mut record = match self.session_store.read(agent_name)? {
            Some(existing) if &existing.session_id == session_id => existing,
            Some(mut existing) => {
                existing.replace_session(session_id.clone(), now);
                existing
            }
            None => SessionRecord::new(agent_name.clone(), session_id.clone(), now),
        };
        record.record_job();
        record.last_used_at = now;
        self.session_store.write(&record)?;
        Ok(())
    }

    async fn drive_one_attempt(
        &self,
        job_id: &JobId,
        request: RunRequest,
        callback: &Option<MessageCallback>,
        should_write_human_log: bool,
    ) -> Result<AttemptOutcome, RuntimeInitError> {
        let mut stream = self.runtime.run(request).await?;

        let mut outcome = AttemptOutcome::default();
        while let Some(raw) = stream.next().await {
            let processed = process(&raw, self.clock.now());
            let message = processed.message;

            if processed.session_id.is_some() {
                outcome.session_id = processed.session_id.map(SessionId::new);
            }
            if let Message::Assistant { summary: Some(s), .. } = &message {
                outcome.summary = Some(s.clone());
            }
            if let Message::Error { message: text, .. } = &message {
                outcome.error = Some(text.clone());
            }

            if let Err(e) = self.message_log.append(job_id, &message) {
                tracing::warn!(job_id = %job_id, error = %e, "failed to append message log entry");
            }
            if should_write_human_log {
                if let Err(e) = self.human_log.append(job_id, message.timestamp(), &human_readable_line(&message)) {
                    tracing::warn!(job_id = %job_id, error = %e, "failed to append human log entry");
                }
            }
            if let Some(cb) = callback {
                let cb = Arc::clone(cb);
                let message_for_cb = message.clone();
                if std::panic::catch_unwind(AssertUnwindSafe(|| cb(&message_for_cb))).is_err() {
                    tracing::warn!(job_id = %job_id, "message callback panicked, ignoring");
                }
            }

            if processed.is_final {
                break;
            }
        }

        Ok(outcome)
    }
}

#[derive(Default)]
struct AttemptOutcome {
    session_id: Option<SessionId>,
    summary: Option<String>,
    error: Option<String>,
}

fn human_readable_line(message: &Message) -> String {
    match message {
        Message::System { content, subtype, .. } => format!("system[{}]: {content}", subtype.as_deref().unwrap_or("-")),
        Message::Assistant { content, partial, .. } => {
            if *partial {
                format!("assistant(partial): {content}")
            } else {
                format!("assistant: {content}")
            }
        }
        Message::ToolUse { tool_name, .. } => format!("tool_use: {tool_name}"),
        Message::ToolResult { success, error, .. } => match error {
            Some(e) => format!("tool_result(failed): {e}"),
            None => format!("tool_result(ok={success})"),
        },
        Message::Error { message, .. } => format!("error: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use herdctl_core::{FakeClock, PermissionMode, RuntimeKind, ToolPermissions};
    use herdctl_storage::StateRoot;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct ScriptedRuntime {
        batches: parking_lot::Mutex<Vec<Vec<serde_json::Value>>>,
    }

    #[async_trait]
    impl Runtime for ScriptedRuntime {
        async fn run(&self, _request: RunRequest) -> Result<herdctl_runtime::MessageStream, RuntimeInitError> {
            let batch = self.batches.lock().pop().unwrap_or_default();
            let (tx, rx) = mpsc::channel(32);
            tokio::spawn(async move {
                for value in batch {
                    let _ = tx.send(value).await;
                }
            });
            Ok(tokio_stream::wrappers::ReceiverStream::new(rx))
        }
    }

    fn sample_agent(name: &str) -> Agent {
        Agent {
            name: AgentName::new(name),
            prompt: "work".into(),
            working_dir: None,
            runtime_kind: RuntimeKind::External,
            containerization: None,
            schedules: vec![],
            max_concurrent: 1,
            session_timeout: std::time::Duration::from_secs(3600),
            permission_mode: PermissionMode::Default,
            tools: ToolPermissions::default(),
            model: None,
            tool_servers: vec![],
        }
    }

    // batches are popped in reverse (Vec::pop), so list them last-attempt-first.
    fn executor_with_batches(dir: &std::path::Path, mut batches: Vec<Vec<serde_json::Value>>) -> Executor<FakeClock> {
        batches.reverse();
        let root = StateRoot::new(dir);
        let runtime = Arc::new(ScriptedRuntime { batches: parking_lot::Mutex::new(batches) });
        Executor::new(
            JobStore::new(root.clone()),
            SessionStore::new(root.clone()),
            MessageLog::new(root.clone()),
            HumanLog::new(root),
            runtime,
            FakeClock::new(),
        )
    }

    #[tokio::test]
    async fn successful_run_records_session_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with_batches(
            dir.path(),
            vec![vec![
                json!({"type": "system", "subtype": "init", "session_id": "sess-1", "content": "starting"}),
                json!({"type": "assistant", "content": "done", "summary": "did the thing", "partial": false}),
                json!({"type": "system", "subtype": "end", "content": "bye"}),
            ]],
        );

        let agent = sample_agent("alpha");
        let request = ExecuteRequest::new(agent, "do work", TriggerType::Manual, CancellationToken::new());
        let result = executor.execute(request).await.unwrap();

        assert!(result.success);
        assert_eq!(result.session_id.as_ref().unwrap().as_str(), "sess-1");
        assert_eq!(result.summary.as_deref(), Some("did the thing"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn session_expiry_triggers_one_shot_retry_without_resume() {
        let dir = tempfile::tempdir().unwrap();
        let root = StateRoot::new(dir.path());
        let session_store = SessionStore::new(root.clone());
        let agent = sample_agent("alpha");
        session_store
            .write(&SessionRecord::new(agent.name.clone(), SessionId::new("sess-old"), Utc::now()))
            .unwrap();

        let executor = executor_with_batches(
            dir.path(),
            vec![
                vec![json!({"type": "error", "message": "Session expired on server"})],
                vec![
                    json!({"type": "assistant", "content": "fresh", "summary": "fresh run", "partial": false}),
                    json!({"type": "system", "subtype": "end", "content": "done"}),
                ],
            ],
        );

        let mut request = ExecuteRequest::new(agent, "continue", TriggerType::Manual, CancellationToken::new());
        request.resume_session = Some(SessionId::new("sess-old"));
        let result = executor.execute(request).await.unwrap();

        assert!(result.success);
        assert_eq!(result.summary.as_deref(), Some("fresh run"));
    }

    #[tokio::test]
    async fn callback_panic_does_not_abort_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with_batches(
            dir.path(),
            vec![vec![
                json!({"type": "assistant", "content": "hi", "summary": "hi", "partial": false}),
                json!({"type": "system", "subtype": "end", "content": "done"}),
            ]],
        );
        let agent = sample_agent("alpha");
        let mut request = ExecuteRequest::new(agent, "work", TriggerType::Manual, CancellationToken::new());
        request.message_callback = Some(Arc::new(|_msg| panic!("boom")));
        let result = executor.execute(request).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn job_created_callback_observes_the_generated_id_before_completion() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with_batches(
            dir.path(),
            vec![vec![
                json!({"type": "assistant", "content": "hi", "summary": "hi", "partial": false}),
                json!({"type": "system", "subtype": "end", "content": "done"}),
            ]],
        );
        let agent = sample_agent("alpha");
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let seen_for_cb = Arc::clone(&seen);
        let mut request = ExecuteRequest::new(agent, "work", TriggerType::Manual, CancellationToken::new());
        request.job_created_callback = Some(Arc::new(move |job_id| *seen_for_cb.lock() = Some(job_id.clone())));
        let result = executor.execute(request).await.unwrap();
        assert_eq!(seen.lock().as_ref(), Some(&result.job_id));
    }

    #[tokio::test]
    async fn error_message_fails_the_job_with_classified_exit_reason() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor_with_batches(dir.path(), vec![vec![json!({"type": "error", "message": "request timeout"})]]);
        let agent = sample_agent("alpha");
        let request = ExecuteRequest::new(agent, "work", TriggerType::Manual, CancellationToken::new());
        let result = executor.execute(request).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("request timeout"));
    }
}
