// SPDX-License-Identifier: MIT

//! `herdctl daemon start|stop|restart` (SPEC_FULL.md §4.0): process
//! lifecycle layered over `herdctld`'s own IPC shutdown contract.
//! `herdctld`'s binary is resolved from `HERDCTLD_BIN`, defaulting to
//! `herdctld` on `PATH` — the CLI never embeds a path to its own
//! install location.

use crate::client::Connection;
use crate::exit_error::ExitError;
use crate::EXIT_OK;
use herdctl_wire::Request;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn start(config_dir: &Path) -> Result<i32, ExitError> {
    let binary = herdctld_binary();
    std::process::Command::new(&binary)
        .env("HERDCTL_CONFIG_DIR", config_dir)
        .spawn()
        .map_err(|e| ExitError::generic(format!("failed to spawn {binary}: {e}")))?;
    println!("herdctld starting (config: {})", config_dir.display());
    Ok(EXIT_OK)
}

pub async fn stop(socket: &Path, wait_for_jobs: bool, timeout_secs: Option<u64>) -> Result<i32, ExitError> {
    let mut conn = Connection::connect(socket).await?;
    conn.roundtrip(&Request::Shutdown { wait_for_jobs, timeout_secs }).await?;
    println!("herdctld stopped");
    Ok(EXIT_OK)
}

pub async fn restart(
    socket: &Path,
    config_dir: &Path,
    wait_for_jobs: bool,
    timeout_secs: Option<u64>,
) -> Result<i32, ExitError> {
    stop(socket, wait_for_jobs, timeout_secs).await?;
    // Give the old process a moment to release the pid file and socket
    // before the new one tries to claim them.
    tokio::time::sleep(Duration::from_millis(300)).await;
    start(config_dir)
}

fn herdctld_binary() -> PathBuf {
    std::env::var_os("HERDCTLD_BIN").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("herdctld"))
}
