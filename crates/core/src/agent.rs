// SPDX-License-Identifier: MIT

//! The resolved, read-only agent configuration record (spec.md §3, §6).
//!
//! `Agent` is produced by an external config loader (YAML/env interpolation
//! is explicitly out of scope for this crate) and handed to the scheduler
//! as an immutable snapshot. Nothing downstream of this type ever mutates
//! it; the scheduler swaps the whole snapshot atomically on reload.

use crate::container::ContainerizationConfig;
use crate::ids::AgentName;
use crate::schedule::Schedule;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// How an agent's job executions are carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    /// In-process call into the provider library.
    Direct,
    /// Out-of-process call into the provider CLI.
    External,
}

/// Tool-use permission mode, passed straight through to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    BypassPermissions,
    Plan,
}

impl Default for PermissionMode {
    fn default() -> Self {
        Self::Default
    }
}

/// Allow/deny sets for tool names and bash command patterns.
///
/// Bash patterns are translated to tool-name patterns of the form
/// `Bash(<pattern>)` before being merged into `allowed_tools`/`denied_tools`
/// (spec.md §6), so by the time an `Agent` reaches the executor the two
/// representations have already been unified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPermissions {
    #[serde(default)]
    pub allowed_tools: HashSet<String>,
    #[serde(default)]
    pub denied_tools: HashSet<String>,
}

impl ToolPermissions {
    /// Fold bash allow/deny glob patterns into the tool-name pattern sets.
    pub fn with_bash_patterns(
        mut self,
        allow_patterns: &[String],
        deny_patterns: &[String],
    ) -> Self {
        for pattern in allow_patterns {
            self.allowed_tools.insert(format!("Bash({pattern})"));
        }
        for pattern in deny_patterns {
            self.denied_tools.insert(format!("Bash({pattern})"));
        }
        self
    }

    /// Extend the allow-list with a glob for every tool exposed by `server`.
    ///
    /// Used when injected tool servers are registered with a runtime
    /// (spec.md §4.4.1): `mcp__<server>__*`.
    pub fn allow_injected_server(&mut self, server_name: &str) {
        self.allowed_tools.insert(format!("mcp__{server_name}__*"));
    }
}

/// A tool server an agent's runtime should make available to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolServerDef {
    /// Spawn `command` as a stdio-based MCP server process.
    Process { name: String, command: String, args: Vec<String> },
    /// An already-running MCP server reachable over HTTP.
    Http { name: String, url: String },
    /// A host-process, in-memory tool server (spec.md §4.4.1/§4.5). The
    /// handler implementation lives in `herdctl-runtime`'s tool-server
    /// registry, keyed by this name — `core` only carries the name so the
    /// config layer can reference it without depending on the runtime.
    Injected { name: String },
}

impl ToolServerDef {
    pub fn name(&self) -> &str {
        match self {
            ToolServerDef::Process { name, .. } => name,
            ToolServerDef::Http { name, .. } => name,
            ToolServerDef::Injected { name } => name,
        }
    }
}

/// The resolved configuration for one agent (spec.md §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub name: AgentName,
    pub prompt: String,
    pub working_dir: Option<PathBuf>,
    pub runtime_kind: RuntimeKind,
    pub containerization: Option<ContainerizationConfig>,
    pub schedules: Vec<Schedule>,
    pub max_concurrent: u32,
    #[serde(with = "humantime_duration")]
    pub session_timeout: Duration,
    pub permission_mode: PermissionMode,
    pub tools: ToolPermissions,
    pub model: Option<String>,
    #[serde(default)]
    pub tool_servers: Vec<ToolServerDef>,
}

impl Agent {
    /// Default session validity window (spec.md §3): 24 hours.
    pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn schedule(&self, name: &str) -> Option<&Schedule> {
        self.schedules.iter().find(|s| s.name == name)
    }
}

/// Serialize/deserialize `Duration` as a plain integer number of seconds.
///
/// Keeps `fleet.toml`/`agents/*.toml` human-writable (`session_timeout_secs
/// = 86400`) without pulling in a textual duration-parsing crate the rest
/// of the workspace does not otherwise need — the only other duration
/// input format in scope is the interval literal grammar, which
/// `herdctl-trigger` owns.
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
