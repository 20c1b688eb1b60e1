// SPDX-License-Identifier: MIT

//! `herdctl cancel <job-id>` (spec.md §6: "`cancel` exits 0 when the
//! cancel reached a terminal state, 1 otherwise").

use crate::client::Connection;
use crate::exit_error::ExitError;
use crate::{EXIT_ERR, EXIT_OK};
use herdctl_wire::{CancelOutcome, Request, Response};

pub async fn run(conn: &mut Connection, job_id: String, timeout_secs: Option<u64>) -> Result<i32, ExitError> {
    let response = conn.roundtrip(&Request::Cancel { job_id, timeout_secs }).await?;
    let Response::Cancelled { outcome } = response else {
        return Err(ExitError::generic("unexpected response to cancel request"));
    };
    println!("{}", describe(outcome));
    Ok(match outcome {
        CancelOutcome::Graceful | CancelOutcome::AlreadyStopped => EXIT_OK,
        CancelOutcome::Forced => EXIT_ERR,
    })
}

fn describe(outcome: CancelOutcome) -> &'static str {
    match outcome {
        CancelOutcome::Graceful => "cancelled",
        CancelOutcome::Forced => "did not stop within the timeout, escalated to forced termination",
        CancelOutcome::AlreadyStopped => "already stopped",
    }
}
