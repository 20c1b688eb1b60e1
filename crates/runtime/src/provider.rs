// SPDX-License-Identifier: MIT

//! The provider seam `DirectRuntime` invokes (spec.md §1: "the concrete
//! LLM/tool provider" is deliberately out of scope). This module only
//! defines the shape of the in-process call; a real build links a
//! concrete [`ProviderClient`] implementation from outside this crate.

use crate::error::RuntimeInitError;
use crate::tool_server::InjectedToolServer;
use crate::MessageStream;
use async_trait::async_trait;
use herdctl_core::PermissionMode;
use std::path::PathBuf;

/// An MCP tool server reference as seen by the provider library's
/// option shape, after `DirectRuntime` has resolved each
/// `herdctl_core::ToolServerDef` into its concrete form.
#[derive(Clone)]
pub enum ResolvedToolServer {
    Process { name: String, command: String, args: Vec<String> },
    Http { name: String, url: String },
    /// An injected server is handed to the provider library as an
    /// in-process object, not serialized — the library calls back into
    /// it directly (spec.md §4.4.1).
    InProcess(InjectedToolServer),
}

/// The provider library's option shape (spec.md §4.4.1): "Must convert
/// the agent record to the backend's option shape (permission mode,
/// allowed/denied tool patterns, model, working directory, MCP tool
/// servers, resume and fork flags)."
#[derive(Clone)]
pub struct ProviderOptions {
    pub prompt: String,
    pub permission_mode: PermissionMode,
    pub allowed_tools: Vec<String>,
    pub denied_tools: Vec<String>,
    pub model: Option<String>,
    pub working_dir: Option<PathBuf>,
    pub mcp_servers: Vec<ResolvedToolServer>,
    pub resume_session_id: Option<String>,
    pub fork: bool,
}

/// The in-process provider library call (spec.md §4.4.1). Out of scope
/// to implement concretely here; `DirectRuntime` depends only on this
/// trait so the real provider can be linked in by the binary crate.
#[async_trait]
pub trait ProviderClient: Send + Sync + 'static {
    async fn start(&self, options: ProviderOptions) -> Result<MessageStream, RuntimeInitError>;
}
