// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herdctl-daemon: `herdctld`, the supervisor process (spec.md §4.8,
//! §4.9). Ties the Scheduler's polling loop, the Fleet Manager facade,
//! and the operator IPC listener together into one binary; see
//! `src/main.rs` for the process entry point and `src/config.rs` for
//! the (deliberately minimal, out-of-scope-per spec.md §1) fleet/agent
//! config loader.

pub mod config;
pub mod fleet;
pub mod listener;
pub mod runtime_factory;
pub mod scheduler;

pub use fleet::{FleetManager, FleetManagerError, TriggerHandle};
pub use runtime_factory::{RuntimeFactory, RuntimeFactoryError};
pub use scheduler::{ExecutorDeps, Scheduler, SchedulerStatus, SchedulerStatusSnapshot, ShutdownTimeoutError};
