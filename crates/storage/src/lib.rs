// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herdctl-storage: crash-safe, file-backed persistence for fleet state
//! (spec.md §4.1). Every write goes through [`atomic`]; typed wrappers
//! on top know their own on-disk path and serialization format.

pub mod atomic;
mod error;
mod fleet_store;
mod human_log;
mod job_store;
mod message_log;
mod paths;
mod pid_file;
mod schedule_state_store;
mod session_store;

pub use error::{SerializeError, StorageError};
pub use fleet_store::FleetStateStore;
pub use human_log::HumanLog;
pub use job_store::JobStore;
pub use message_log::MessageLog;
pub use paths::StateRoot;
pub use pid_file::PidFile;
pub use schedule_state_store::ScheduleStateStore;
pub use session_store::SessionStore;
