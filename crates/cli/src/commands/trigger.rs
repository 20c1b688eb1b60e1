// SPDX-License-Identifier: MIT

//! `herdctl trigger <agent> [--wait]` (spec.md §4.9, §6: "`trigger` in
//! wait-mode exits with the job's effective success code").

use crate::client::Connection;
use crate::exit_error::ExitError;
use crate::{EXIT_ERR, EXIT_INTERRUPTED, EXIT_OK};
use herdctl_wire::{Request, Response};

pub async fn run(
    conn: &mut Connection,
    agent: String,
    schedule: Option<String>,
    prompt: Option<String>,
    wait: bool,
) -> Result<i32, ExitError> {
    conn.send(&Request::Trigger { agent, schedule, prompt, wait }).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        frame = conn.recv() => match frame? {
            Response::Triggered { job_id, success, exit_reason } => {
                let reason = exit_reason.as_deref().unwrap_or("dispatched");
                println!("{job_id} {reason}");
                Ok(if !wait || success { EXIT_OK } else { EXIT_ERR })
            }
            Response::Error { message } => Err(ExitError::generic(message)),
            _ => Err(ExitError::generic("unexpected response to trigger request")),
        },
        _ = &mut ctrl_c => Ok(EXIT_INTERRUPTED),
    }
}
