// SPDX-License-Identifier: MIT

//! Builds the concrete [`Runtime`] each agent runs against (spec.md §2:
//! "Job Executor obtains a Runtime (via the Runtime Factory)").
//!
//! `RuntimeKind::External` is the only kind this build can actually
//! start: `RuntimeKind::Direct` calls into `herdctl_runtime::DirectRuntime`,
//! which is generic over a [`herdctl_runtime::ProviderClient`] the
//! provider library supplies from outside this crate (spec.md §1: the
//! concrete LLM/tool provider is out of scope). No such implementation
//! is linked into `herdctld`, so an agent configured for `Direct`
//! fails fast with a named error at factory time rather than at first
//! job dispatch.

use herdctl_core::{Agent, FleetContainerOverrides, RuntimeKind};
use herdctl_runtime::{ContainerRunner, ContainerWorkload, ExternalRuntime, MessageStream, Runtime, RuntimeInitError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeFactoryError {
    #[error("agent {agent} is configured for the direct (in-process) runtime, but this build has no provider library linked in")]
    NoProviderLinked { agent: String },
}

/// Where the Runtime Factory finds the things every runtime needs.
pub struct RuntimeFactory {
    /// Provider CLI binary name/path for `ExternalRuntime` (spec.md §4.4.2).
    pub external_binary: String,
    /// Root directory the provider writes per-session JSONL logs under.
    pub sessions_root: PathBuf,
    /// Root directory host-side container session mounts live under
    /// (spec.md §6: `docker-sessions/`).
    pub docker_sessions_root: PathBuf,
    pub container_overrides: FleetContainerOverrides,
}

impl RuntimeFactory {
    pub fn build(&self, agent: &Agent) -> Result<Arc<dyn Runtime>, RuntimeFactoryError> {
        let base: Arc<dyn Runtime> = match agent.runtime_kind {
            RuntimeKind::External => Arc::new(ExternalRuntime::new(self.external_binary.clone(), self.sessions_root.clone())),
            RuntimeKind::Direct => {
                return Err(RuntimeFactoryError::NoProviderLinked { agent: agent.name.to_string() });
            }
        };

        if agent.containerization.is_none() {
            return Ok(base);
        }

        let workload = ContainerWorkload::External { binary: self.external_binary.clone() };
        let runner = ContainerRunner::new(workload, self.docker_sessions_root.clone())
            .with_fleet_overrides(self.container_overrides.clone());
        Ok(Arc::new(runner))
    }
}

/// A [`Runtime`] that fails every run immediately. Used by the
/// Scheduler as a last resort when [`RuntimeFactory::build`] itself
/// fails for an agent, so one misconfigured agent cannot take down the
/// polling loop (spec.md §4.8's schedule runs keep failing rather than
/// panicking).
struct AlwaysFailingRuntime {
    reason: String,
}

#[async_trait::async_trait]
impl Runtime for AlwaysFailingRuntime {
    async fn run(&self, _request: herdctl_runtime::RunRequest) -> Result<MessageStream, RuntimeInitError> {
        Err(RuntimeInitError::ProviderUnavailable(self.reason.clone()))
    }
}

pub fn always_failing_runtime(reason: impl Into<String>) -> impl Runtime {
    AlwaysFailingRuntime { reason: reason.into() }
}
