// SPDX-License-Identifier: MIT

//! Container configuration for running an agent inside a per-agent
//! isolated container (spec.md §4.4.3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Persistent containers are reused across jobs for the same agent;
/// ephemeral containers are created fresh per job with auto-remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerLifecycle {
    Persistent,
    Ephemeral,
}

impl Default for ContainerLifecycle {
    fn default() -> Self {
        Self::Ephemeral
    }
}

/// Non-root user the container process runs as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUser {
    pub uid: u32,
    pub gid: u32,
}

/// A bind or volume mount beyond the mandatory `/workspace` mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraMount {
    pub host_path: PathBuf,
    pub container_path: PathBuf,
    #[serde(default)]
    pub read_only: bool,
}

/// Resource limits applied to the container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub pids_limit: Option<u32>,
    pub cpus: Option<f64>,
    pub memory_bytes: Option<u64>,
}

/// Per-agent container configuration (spec.md §4.4.3).
///
/// Fields here are the ones a per-agent config file may set directly.
/// Fields that weaken isolation — custom image, network mode, arbitrary
/// extra mounts, arbitrary environment, or a raw host-config override —
/// live on [`FleetContainerOverrides`] instead and are merged in only at
/// the fleet level (spec.md §7's trust boundary); `ContainerizationConfig`
/// itself carries none of those, so an agent file cannot smuggle them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerizationConfig {
    pub lifecycle: ContainerLifecycle,
    #[serde(default)]
    pub user: Option<ContainerUser>,
    #[serde(default)]
    pub workspace_read_only: bool,
    #[serde(default)]
    pub credential_mount: Option<PathBuf>,
    #[serde(default)]
    pub resources: ResourceLimits,
    /// Retain at most this many stopped containers per agent; older ones
    /// are removed during the post-run cleanup pass.
    #[serde(default = "default_max_containers")]
    pub max_containers: u32,
}

fn default_max_containers() -> u32 {
    3
}

impl Default for ContainerizationConfig {
    fn default() -> Self {
        Self {
            lifecycle: ContainerLifecycle::default(),
            user: None,
            workspace_read_only: false,
            credential_mount: None,
            resources: ResourceLimits::default(),
            max_containers: default_max_containers(),
        }
    }
}

/// Fleet-level fields that can weaken container isolation.
///
/// Spec.md §7: "Fields that can weaken container isolation ... must be
/// accepted only from fleet-level configuration, never from agent-level
/// files." This type exists precisely so there is no field on
/// [`ContainerizationConfig`] an agent author could set to the same
/// effect; the fleet config loader is the only place this type appears.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetContainerOverrides {
    pub image: Option<String>,
    pub network_mode: Option<String>,
    #[serde(default)]
    pub extra_mounts: Vec<ExtraMount>,
    #[serde(default)]
    pub extra_env: HashMap<String, String>,
    /// Raw `docker run` flags merged in last, verbatim, after every other
    /// computed host-config field. Escape hatch for fields this schema
    /// does not model.
    #[serde(default)]
    pub raw_host_config: HashMap<String, serde_json::Value>,
}
