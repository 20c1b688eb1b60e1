// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herdctl-trigger: pure interval-literal and cron-expression evaluation
//! (spec.md §4.3). No I/O, no clock of its own — every function here
//! takes the reference instant as a parameter so the scheduler can
//! drive it with a real or fake clock without this crate depending on
//! `herdctl-core::Clock` directly.

mod cron;
mod interval;

pub use cron::{CronParseError, CronSchedule};
pub use interval::{format_interval, next_trigger_at, parse_interval, IntervalParseError};
