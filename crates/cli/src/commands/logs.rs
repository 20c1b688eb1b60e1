// SPDX-License-Identifier: MIT

//! `herdctl logs <job-id> [--follow]` (spec.md §4.9, §6: "Interrupt
//! during any streaming command exits 130").

use crate::client::Connection;
use crate::exit_error::ExitError;
use crate::{EXIT_INTERRUPTED, EXIT_OK};
use herdctl_wire::{Request, Response};

pub async fn run(conn: &mut Connection, job_id: String, follow: bool) -> Result<i32, ExitError> {
    conn.send(&Request::Logs { job_id, follow }).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            frame = conn.recv() => {
                match frame? {
                    Response::LogLine(line) => println!("{line}"),
                    Response::LogsDone => return Ok(EXIT_OK),
                    Response::Error { message } => return Err(ExitError::generic(message)),
                    _ => return Err(ExitError::generic("unexpected response to logs request")),
                }
            }
            _ = &mut ctrl_c => return Ok(EXIT_INTERRUPTED),
        }
    }
}
