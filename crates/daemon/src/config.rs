// SPDX-License-Identifier: MIT

//! Fleet configuration loader (spec.md §2, §7; SPEC_FULL.md §2, §4.0).
//!
//! Deliberately minimal, the way `herdctl_core::Agent`'s doc comment
//! describes its own loader: "YAML/env interpolation is explicitly out
//! of scope." This one reads plain TOML, has no templating, and is not
//! part of the tested core (spec.md scopes persistence/scheduling/
//! execution, not config authoring). It exists so `herdctld` has agents
//! to schedule at all.
//!
//! Layout under a config directory:
//! ```text
//! <config_dir>/fleet.toml       # fleet-wide settings + container overrides
//! <config_dir>/agents/*.toml    # one file per agent
//! ```

use herdctl_core::{
    Agent, AgentName, ContainerLifecycle, ContainerUser, ContainerizationConfig, ExtraMount,
    FleetContainerOverrides, PermissionMode, ResourceLimits, RuntimeKind, Schedule, ToolPermissions,
    ToolServerDef,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("{path} does not exist; a fleet needs at least fleet.toml to start")]
    MissingFleetToml { path: PathBuf },

    #[error("parsing {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    /// spec.md §7's container trust boundary: a per-agent file tried to
    /// set a field that only fleet-level configuration may set.
    #[error("agent config {path} sets a fleet-only container field: {source}")]
    TrustBoundary { path: PathBuf, source: toml::de::Error },
}

/// Fleet-wide settings (spec.md §2's "state root", §6's shutdown
/// timeout, §7's container trust boundary).
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub state_root: PathBuf,
    pub socket_path: PathBuf,
    pub check_interval: Duration,
    pub shutdown_timeout: Duration,
    pub default_session_timeout: Duration,
    pub container_overrides: FleetContainerOverrides,
}

#[derive(Debug, Deserialize)]
struct FleetFile {
    state_root: PathBuf,
    #[serde(default)]
    socket_path: Option<PathBuf>,
    #[serde(default = "default_check_interval_secs")]
    check_interval_secs: u64,
    #[serde(default = "default_shutdown_timeout_secs")]
    shutdown_timeout_secs: u64,
    #[serde(default = "default_session_timeout_secs")]
    default_session_timeout_secs: u64,
    #[serde(default)]
    container_overrides: FleetContainerOverrides,
}

fn default_check_interval_secs() -> u64 {
    1
}
fn default_shutdown_timeout_secs() -> u64 {
    30
}
fn default_session_timeout_secs() -> u64 {
    Agent::DEFAULT_SESSION_TIMEOUT.as_secs()
}

/// Load `<config_dir>/fleet.toml`.
pub fn load_fleet_config(config_dir: &Path) -> Result<FleetConfig, ConfigError> {
    let path = config_dir.join("fleet.toml");
    if !path.exists() {
        return Err(ConfigError::MissingFleetToml { path });
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io { path: path.clone(), source })?;
    let file: FleetFile = toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;

    let socket_path = file.socket_path.unwrap_or_else(|| file.state_root.join("herdctl.sock"));
    Ok(FleetConfig {
        state_root: file.state_root,
        socket_path,
        check_interval: Duration::from_secs(file.check_interval_secs),
        shutdown_timeout: Duration::from_secs(file.shutdown_timeout_secs),
        default_session_timeout: Duration::from_secs(file.default_session_timeout_secs),
        container_overrides: file.container_overrides,
    })
}

/// Human-writable per-agent container config: the same shape as
/// [`ContainerizationConfig`], with unknown fields rejected outright
/// rather than silently ignored. The field set here is, by
/// construction, exactly the set `ContainerizationConfig` carries — no
/// isolation-weakening field exists for an agent file to spell, so
/// `deny_unknown_fields` is what turns a typo'd or malicious extra key
/// (e.g. a stray `image = "..."`) into a load-time `TrustBoundary`
/// error instead of a silently-ignored no-op (spec.md §7).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentContainerFile {
    lifecycle: ContainerLifecycle,
    #[serde(default)]
    user: Option<ContainerUser>,
    #[serde(default)]
    workspace_read_only: bool,
    #[serde(default)]
    credential_mount: Option<PathBuf>,
    #[serde(default)]
    resources: ResourceLimits,
    #[serde(default)]
    max_containers: Option<u32>,
}

impl From<AgentContainerFile> for ContainerizationConfig {
    fn from(file: AgentContainerFile) -> Self {
        let mut config = ContainerizationConfig { lifecycle: file.lifecycle, ..Default::default() };
        config.user = file.user;
        config.workspace_read_only = file.workspace_read_only;
        config.credential_mount = file.credential_mount;
        config.resources = file.resources;
        if let Some(max_containers) = file.max_containers {
            config.max_containers = max_containers;
        }
        config
    }
}

#[derive(Debug, Deserialize)]
struct AgentFile {
    name: String,
    prompt: String,
    #[serde(default)]
    working_dir: Option<PathBuf>,
    #[serde(default = "default_runtime_kind")]
    runtime: RuntimeKind,
    #[serde(default)]
    containerization: Option<toml::Value>,
    #[serde(default)]
    schedules: Vec<Schedule>,
    #[serde(default = "default_max_concurrent")]
    max_concurrent: u32,
    #[serde(default)]
    session_timeout_secs: Option<u64>,
    #[serde(default)]
    permission_mode: PermissionMode,
    #[serde(default)]
    allowed_tools: Vec<String>,
    #[serde(default)]
    denied_tools: Vec<String>,
    #[serde(default)]
    bash_allow: Vec<String>,
    #[serde(default)]
    bash_deny: Vec<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tool_servers: Vec<ToolServerDef>,
}

fn default_max_concurrent() -> u32 {
    1
}

fn default_runtime_kind() -> RuntimeKind {
    RuntimeKind::External
}

/// Load every `<config_dir>/agents/*.toml` file into a resolved
/// [`Agent`]. Returns an empty list if the `agents` directory itself is
/// absent — a fleet with zero agents configured is valid, just idle.
pub fn load_agents(config_dir: &Path, default_session_timeout: Duration) -> Result<Vec<Agent>, ConfigError> {
    let agents_dir = config_dir.join("agents");
    if !agents_dir.exists() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(&agents_dir).map_err(|source| ConfigError::Io { path: agents_dir.clone(), source })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("toml"))
        .collect();
    paths.sort();

    let mut agents = Vec::with_capacity(paths.len());
    for path in paths {
        agents.push(load_agent_file(&path, default_session_timeout)?);
    }
    Ok(agents)
}

fn load_agent_file(path: &Path, default_session_timeout: Duration) -> Result<Agent, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let file: AgentFile = toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

    let containerization = match file.containerization {
        None => None,
        Some(value) => {
            let parsed = AgentContainerFile::deserialize(value)
                .map_err(|source| ConfigError::TrustBoundary { path: path.to_path_buf(), source })?;
            Some(ContainerizationConfig::from(parsed))
        }
    };
    debug_assert!(
        !matches_fleet_only_field(&containerization),
        "ContainerizationConfig has no fleet-only fields by construction; see herdctl_core::container"
    );

    let tools = ToolPermissions { allowed_tools: file.allowed_tools.into_iter().collect(), denied_tools: file.denied_tools.into_iter().collect() }
        .with_bash_patterns(&file.bash_allow, &file.bash_deny);

    let session_timeout = file.session_timeout_secs.map(Duration::from_secs).unwrap_or(default_session_timeout);

    Ok(Agent {
        name: AgentName::new(file.name),
        prompt: file.prompt,
        working_dir: file.working_dir,
        runtime_kind: file.runtime,
        containerization,
        schedules: file.schedules,
        max_concurrent: file.max_concurrent,
        session_timeout,
        permission_mode: file.permission_mode,
        tools,
        model: file.model,
        tool_servers: file.tool_servers,
    })
}

/// Always `false`: a structural reminder, not a real check. Kept as a
/// named function (rather than inlining `false` into the
/// `debug_assert!`) so the invariant it documents — that
/// `ContainerizationConfig` cannot carry a fleet-only field — has a
/// place to be revisited if that type ever grows one.
fn matches_fleet_only_field(_config: &Option<ContainerizationConfig>) -> bool {
    false
}

/// Agent name → fleet-level `FleetContainerOverrides` merge helper for
/// `herdctl_runtime::ContainerRunner::with_fleet_overrides`. Not agent-
/// specific: the same overrides apply fleet-wide (spec.md §7).
pub fn container_overrides_map(agents: &[Agent], overrides: &FleetContainerOverrides) -> HashMap<AgentName, FleetContainerOverrides> {
    agents.iter().map(|agent| (agent.name.clone(), overrides.clone())).collect()
}
