// SPDX-License-Identifier: MIT

//! `herdctl`: the operator CLI for `herdctld` (spec.md §4.9, §6).
//!
//! A thin client: every subcommand opens one connection to the
//! supervisor's Unix domain socket, sends one request, and renders
//! whatever comes back. No local state, no config parsing — that all
//! lives in `herdctld`.

mod client;
mod color;
mod commands;
mod exit_error;
mod output;

use crate::client::Connection;
use crate::exit_error::ExitError;
use crate::output::OutputFormat;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use std::path::PathBuf;

/// Read-only queries exit 0 on success (spec.md §6).
pub const EXIT_OK: i32 = 0;
/// Read-only queries and failed mutations exit 1 on error.
pub const EXIT_ERR: i32 = 1;
/// Interrupt during a streaming command.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "herdctl", version, about = "Control and inspect a herdctld fleet supervisor")]
struct Cli {
    /// Path to the supervisor's IPC socket.
    #[arg(long, global = true, env = "HERDCTL_SOCKET", default_value = "/var/lib/herdctl/herdctl.sock")]
    socket: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fleet-wide status, or a single agent's status.
    Status {
        agent: Option<String>,
    },
    /// List configured agents, one line each.
    Agents,
    /// List recorded jobs, newest first.
    Jobs {
        #[arg(long)]
        agent: Option<String>,
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
    /// Show one job's full record.
    Job {
        job_id: String,
    },
    /// Stream a job's message log.
    Logs {
        job_id: String,
        #[arg(long, short = 'f')]
        follow: bool,
    },
    /// Run an agent immediately, outside its configured schedules.
    Trigger {
        agent: String,
        #[arg(long)]
        schedule: Option<String>,
        #[arg(long)]
        prompt: Option<String>,
        /// Block until the job reaches a terminal state and exit with
        /// its effective success code.
        #[arg(long)]
        wait: bool,
    },
    /// Cancel a running job.
    Cancel {
        job_id: String,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Manage the herdctld process itself.
    #[command(subcommand)]
    Daemon(DaemonCommand),
}

#[derive(Subcommand)]
enum DaemonCommand {
    /// Spawn herdctld in the background.
    Start {
        #[arg(long, env = "HERDCTL_CONFIG_DIR", default_value = "/etc/herdctl")]
        config_dir: PathBuf,
    },
    /// Ask a running herdctld to shut down.
    Stop {
        #[arg(long, default_value_t = true)]
        wait_for_jobs: bool,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Stop, then start herdctld again.
    Restart {
        #[arg(long, env = "HERDCTL_CONFIG_DIR", default_value = "/etc/herdctl")]
        config_dir: PathBuf,
        #[arg(long, default_value_t = true)]
        wait_for_jobs: bool,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let matches = Cli::command().styles(color::styles()).get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("herdctl: {e}");
            EXIT_ERR
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32, ExitError> {
    // `daemon start|stop|restart` manage the socket's own lifetime, so
    // they open connections on their own terms rather than sharing the
    // single upfront connection every other subcommand uses.
    match cli.command {
        Command::Daemon(DaemonCommand::Start { config_dir }) => return commands::daemon::start(&config_dir),
        Command::Daemon(DaemonCommand::Stop { wait_for_jobs, timeout_secs }) => {
            return commands::daemon::stop(&cli.socket, wait_for_jobs, timeout_secs).await;
        }
        Command::Daemon(DaemonCommand::Restart { config_dir, wait_for_jobs, timeout_secs }) => {
            return commands::daemon::restart(&cli.socket, &config_dir, wait_for_jobs, timeout_secs).await;
        }
        _ => {}
    }

    let mut conn = Connection::connect(&cli.socket).await?;
    match cli.command {
        Command::Status { agent } => commands::status::run(&mut conn, agent, cli.output).await,
        Command::Agents => commands::status::agents(&mut conn, cli.output).await,
        Command::Jobs { agent, limit } => commands::jobs::list(&mut conn, agent, limit, cli.output).await,
        Command::Job { job_id } => commands::jobs::show(&mut conn, job_id, cli.output).await,
        Command::Logs { job_id, follow } => commands::logs::run(&mut conn, job_id, follow).await,
        Command::Trigger { agent, schedule, prompt, wait } => {
            commands::trigger::run(&mut conn, agent, schedule, prompt, wait).await
        }
        Command::Cancel { job_id, timeout_secs } => commands::cancel::run(&mut conn, job_id, timeout_secs).await,
        Command::Daemon(_) => unreachable!("handled above"),
    }
}
