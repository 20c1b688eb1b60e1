// SPDX-License-Identifier: MIT

//! `herdctld`: the fleet supervisor process (spec.md §4.8, §6).
//!
//! Reads a config directory, loads agents, then runs the Scheduler's
//! polling loop and the operator IPC listener concurrently until a
//! SIGTERM/SIGINT initiates graceful shutdown.

use anyhow::Context;
use clap::Parser;
use herdctl_core::{Agent, SystemClock};
use herdctl_daemon::fleet::FleetManager;
use herdctl_daemon::runtime_factory::RuntimeFactory;
use herdctl_daemon::scheduler::{ExecutorDeps, Scheduler};
use herdctl_daemon::{config, listener};
use herdctl_engine::{ScheduleRunner, WorkSourceRegistry};
use herdctl_storage::{HumanLog, JobStore, MessageLog, PidFile, ScheduleStateStore, SessionStore, StateRoot};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "herdctld", about = "Multi-agent fleet supervisor daemon")]
struct Args {
    /// Directory containing fleet.toml and agents/*.toml.
    #[arg(long, env = "HERDCTL_CONFIG_DIR", default_value = "/etc/herdctl")]
    config_dir: PathBuf,

    /// Provider CLI binary the external runtime shells out to (spec.md §4.4.2).
    #[arg(long, env = "HERDCTL_AGENT_BINARY", default_value = "claude")]
    agent_binary: String,

    /// Emit compact human-readable logs instead of structured JSON.
    #[arg(long, env = "HERDCTL_LOG_TEXT")]
    log_text: bool,

    /// Directory to write herdctld.log into. Defaults to the fleet's state root.
    #[arg(long, env = "HERDCTL_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let fleet_config = config::load_fleet_config(&args.config_dir).context("loading fleet.toml")?;

    let log_dir = args.log_dir.clone().unwrap_or_else(|| fleet_config.state_root.clone());
    // Held for the process's lifetime: dropping it stops the non-blocking
    // writer's background flush thread.
    let _log_guard = init_tracing(&log_dir, !args.log_text)?;

    let agent_files = config::load_agents(&args.config_dir, fleet_config.default_session_timeout)
        .context("loading agents/*.toml")?;
    let agents: Vec<Arc<Agent>> = agent_files.into_iter().map(Arc::new).collect();

    tracing::info!(agent_count = agents.len(), state_root = %fleet_config.state_root.display(), "herdctld starting");

    let root = StateRoot::new(&fleet_config.state_root);
    let clock = SystemClock;

    let schedule_runner = Arc::new(ScheduleRunner::new(
        ScheduleStateStore::new(root.clone()),
        WorkSourceRegistry::new(),
        clock.clone(),
    ));
    let runtime_factory = Arc::new(RuntimeFactory {
        external_binary: args.agent_binary,
        sessions_root: fleet_config.state_root.join("sessions"),
        docker_sessions_root: fleet_config.state_root.join("docker-sessions"),
        container_overrides: fleet_config.container_overrides.clone(),
    });
    let executor_deps = ExecutorDeps {
        job_store: JobStore::new(root.clone()),
        session_store: SessionStore::new(root.clone()),
        message_log: MessageLog::new(root.clone()),
        human_log: HumanLog::new(root.clone()),
        clock: clock.clone(),
    };

    let scheduler = Arc::new(Scheduler::new(
        agents,
        schedule_runner,
        runtime_factory,
        executor_deps,
        clock,
        fleet_config.check_interval,
    ));

    let fleet = Arc::new(FleetManager::new(
        Arc::clone(&scheduler),
        PidFile::new(root.clone()),
        JobStore::new(root.clone()),
        MessageLog::new(root),
        fleet_config.shutdown_timeout,
    ));
    fleet.claim_pid_file().context("claiming pid file")?;

    let listener_shutdown = CancellationToken::new();

    let scheduler_handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await })
    };

    let listener_handle = {
        let fleet = Arc::clone(&fleet);
        let shutdown = listener_shutdown.clone();
        let socket_path = fleet_config.socket_path.clone();
        tokio::spawn(async move {
            if let Err(e) = listener::serve(&socket_path, fleet, shutdown).await {
                tracing::error!(error = %e, "ipc listener exited with an error");
            }
        })
    };

    wait_for_shutdown_signal().await.context("installing signal handlers")?;
    tracing::info!("shutdown signal received, stopping gracefully");

    // A second signal arriving during this await is simply never observed
    // (spec.md §6: "a second signal is ignored while stopping").
    if let Err(e) = fleet.shutdown(true, None).await {
        tracing::warn!(error = %e, "graceful shutdown did not complete cleanly");
    }
    listener_shutdown.cancel();

    let _ = scheduler_handle.await;
    let _ = listener_handle.await;

    tracing::info!("herdctld stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Logs to `<log_dir>/herdctld.log`, rotated only at process start —
/// in-process rotation is handled by the platform's log rotation
/// tooling, not by `herdctld` itself. JSON by default (`--log-json`
/// knob, spec.md's ambient observability section); `--log-text` switches
/// to the compact human format for local/interactive use.
fn init_tracing(log_dir: &std::path::Path, json: bool) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(log_dir).context("creating log directory")?;
    let file_appender = tracing_appender::rolling::never(log_dir, "herdctld.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(non_blocking)).init();
    } else {
        registry.with(fmt::layer().with_writer(non_blocking)).init();
    }

    Ok(guard)
}
