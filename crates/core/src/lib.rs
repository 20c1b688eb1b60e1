// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herdctl-core: shared data model for the fleet supervisor — agent
//! configuration, schedules, jobs, messages, sessions, and fleet state.
//! No I/O, no async; every other crate in the workspace depends on this
//! one.

pub mod macros;

pub mod agent;
pub mod clock;
pub mod container;
pub mod fleet;
pub mod ids;
pub mod job;
pub mod message;
pub mod schedule;
pub mod session;
#[cfg(feature = "test-support")]
pub mod test_support;

pub use agent::{Agent, PermissionMode, RuntimeKind, ToolPermissions, ToolServerDef};
pub use clock::{Clock, FakeClock, SystemClock};
pub use container::{
    ContainerLifecycle, ContainerUser, ContainerizationConfig, ExtraMount,
    FleetContainerOverrides, ResourceLimits,
};
pub use fleet::{AgentStatusView, FleetState};
pub use ids::{AgentName, JobId, SessionId};
pub use job::{is_recoverable_error, is_session_expired_error, ExitReason, Job, JobStatus, TriggerType};
pub use message::{Message, TERMINAL_SYSTEM_SUBTYPES};
pub use schedule::{Schedule, ScheduleKind, ScheduleState, ScheduleStatus, WorkSourceRef};
pub use session::{SessionMode, SessionRecord};
