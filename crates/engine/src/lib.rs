// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herdctl-engine: the Job Executor and Schedule Runner (spec.md §4.6,
//! §4.7). Everything here runs one job or one schedule tick to
//! completion; deciding *when* to call in is the Scheduler's job, in
//! `herdctl-daemon`.

mod executor;
mod schedule_runner;
mod work_source;

pub use executor::{ErrorDetails, ExecuteRequest, Executor, ExecutorError, JobCreatedCallback, MessageCallback, RunResult};
pub use schedule_runner::{ScheduleRunner, ScheduleRunnerError, ScheduleTickOutcome, SkipReason, WorkSourceRegistry};
pub use work_source::{FileQueueWorkSource, NullWorkSource, WorkItem, WorkSource, WorkSourceError};
