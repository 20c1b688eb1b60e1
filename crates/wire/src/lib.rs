// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herdctl-wire: the `Request`/`Response` DTOs and framing for the
//! `herdctl` CLI's IPC conversation with `herdctld` (spec.md §6).

mod framing;
mod request;
mod response;

pub use framing::{read_frame, write_frame, FramingError};
pub use request::Request;
pub use response::{
    AgentStatusSummary, CancelOutcome, FleetStatusView, JobDetailView, JobSummary, Response, ScheduleSummary,
};
