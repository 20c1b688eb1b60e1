// SPDX-License-Identifier: MIT

//! The operator IPC listener: accepts `herdctl` CLI connections on a
//! Unix domain socket and serves `herdctl_wire::Request`/`Response`
//! frames against the [`FleetManager`] (spec.md §4.9, §6).
//!
//! One task per connection; each request is handled to completion (or,
//! for `Logs { follow: true }` and `Trigger { wait: true }`, streamed)
//! before the next frame is read from the same connection.

use crate::fleet::{FleetManager, TriggerHandle};
use herdctl_core::{AgentName, Clock, JobId};
use herdctl_wire::{read_frame, write_frame, FramingError, Request, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

/// Poll interval for `Logs { follow: true }`: short enough that a CLI
/// watching a job feels live, without a filesystem watcher per viewer
/// (the event-driven tailing mandated by spec.md §4.4.2/§9 lives in
/// `herdctl_runtime::ExternalRuntime`, which already owns getting
/// messages onto disk promptly; this loop only notices they arrived).
const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Applied to `Request::Cancel` when the CLI didn't pass
/// `--timeout-secs` (spec.md §5 names no default; this mirrors the
/// order of magnitude of `Shutdown`'s 30s default without assuming a
/// cancel should wait nearly as long).
const DEFAULT_CANCEL_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn serve<C: Clock>(
    socket_path: &std::path::Path,
    fleet: Arc<FleetManager<C>>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let fleet = Arc::clone(&fleet);
                let conn_shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, fleet, conn_shutdown).await {
                        tracing::debug!(error = %e, "ipc connection ended");
                    }
                });
            }
        }
    }
}

async fn handle_connection<C: Clock>(
    stream: UnixStream,
    fleet: Arc<FleetManager<C>>,
    shutdown: CancellationToken,
) -> Result<(), FramingError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = tokio::io::BufReader::new(read_half);

    loop {
        let request: Request = match read_frame(&mut reader).await {
            Ok(request) => request,
            Err(FramingError::Closed) => return Ok(()),
            Err(e) => return Err(e),
        };

        match request {
            Request::Status => {
                let response = match fleet.fleet_status() {
                    Ok(view) => Response::Status(view),
                    Err(e) => Response::Error { message: e.to_string() },
                };
                write_frame(&mut write_half, &response).await?;
            }
            Request::AgentStatus { agent } => {
                let response = match fleet.agent_status(&AgentName::new(agent.clone())) {
                    Ok(Some(view)) => Response::AgentStatus(view),
                    Ok(None) => Response::Error { message: format!("no agent named {agent:?} is configured") },
                    Err(e) => Response::Error { message: e.to_string() },
                };
                write_frame(&mut write_half, &response).await?;
            }
            Request::JobList { agent, limit } => {
                let response = match fleet.job_list(agent.as_deref(), limit) {
                    Ok(jobs) => Response::Jobs(jobs),
                    Err(e) => Response::Error { message: e.to_string() },
                };
                write_frame(&mut write_half, &response).await?;
            }
            Request::JobDetail { job_id } => {
                let response = match fleet.job_detail(&JobId::from_string(job_id.clone())) {
                    Ok(Some(detail)) => Response::Job(detail),
                    Ok(None) => Response::Error { message: format!("no job {job_id:?}") },
                    Err(e) => Response::Error { message: e.to_string() },
                };
                write_frame(&mut write_half, &response).await?;
            }
            Request::Logs { job_id, follow } => {
                stream_logs(&fleet, &job_id, follow, &mut write_half, &shutdown).await?;
            }
            Request::Trigger { agent, schedule, prompt, wait } => {
                let response = match fleet.trigger(&AgentName::new(agent), schedule, prompt, wait).await {
                    Ok(TriggerHandle::Dispatched { job_id }) => {
                        Response::Triggered { job_id: job_id.to_string(), success: true, exit_reason: None }
                    }
                    Ok(TriggerHandle::Finished { job_id, success, exit_reason }) => Response::Triggered {
                        job_id: job_id.to_string(),
                        success,
                        exit_reason: Some(if exit_reason { "success".into() } else { "error".into() }),
                    },
                    Err(e) => Response::Error { message: e.to_string() },
                };
                write_frame(&mut write_half, &response).await?;
            }
            Request::Cancel { job_id, timeout_secs } => {
                let timeout = timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_CANCEL_TIMEOUT);
                let response = match fleet.cancel(&JobId::from_string(job_id), timeout).await {
                    Ok(outcome) => Response::Cancelled { outcome },
                    Err(e) => Response::Error { message: e.to_string() },
                };
                write_frame(&mut write_half, &response).await?;
            }
            Request::Shutdown { wait_for_jobs, timeout_secs } => {
                let timeout = timeout_secs.map(Duration::from_secs);
                let response = match fleet.shutdown(wait_for_jobs, timeout).await {
                    Ok(()) => Response::ShutdownAck,
                    Err(e) => Response::Error { message: e.to_string() },
                };
                write_frame(&mut write_half, &response).await?;
                shutdown.cancel();
                return Ok(());
            }
        }
    }
}

async fn stream_logs<C: Clock>(
    fleet: &Arc<FleetManager<C>>,
    job_id: &str,
    follow: bool,
    write_half: &mut (impl tokio::io::AsyncWrite + Unpin),
    shutdown: &CancellationToken,
) -> Result<(), FramingError> {
    let job_id_typed = JobId::from_string(job_id.to_string());
    let mut sent = 0usize;

    loop {
        let (lines, job_status) = match fleet.job_log_lines(&job_id_typed, sent) {
            Ok(result) => result,
            Err(e) => {
                write_frame(write_half, &Response::Error { message: e.to_string() }).await?;
                return Ok(());
            }
        };
        for line in &lines {
            write_frame(write_half, &Response::LogLine(line.clone())).await?;
        }
        sent += lines.len();

        let job_is_terminal = job_status.map(|s| s.is_terminal()).unwrap_or(true);
        if !follow || job_is_terminal {
            write_frame(write_half, &Response::LogsDone).await?;
            return Ok(());
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                write_frame(write_half, &Response::LogsDone).await?;
                return Ok(());
            }
            _ = tokio::time::sleep(FOLLOW_POLL_INTERVAL) => {}
        }
    }
}
