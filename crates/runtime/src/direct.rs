// SPDX-License-Identifier: MIT

//! In-process runtime: calls the provider library directly in the same
//! process and re-yields each message it produces (spec.md §4.4.1).

use crate::error::RuntimeInitError;
use crate::provider::{ProviderClient, ProviderOptions, ResolvedToolServer};
use crate::request::RunRequest;
use crate::{MessageStream, Runtime};
use async_trait::async_trait;
use herdctl_core::ToolServerDef;
use std::sync::Arc;

pub struct DirectRuntime<P: ProviderClient> {
    provider: Arc<P>,
}

impl<P: ProviderClient> DirectRuntime<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    fn resolve_tool_servers(request: &RunRequest) -> Vec<ResolvedToolServer> {
        let mut resolved: Vec<ResolvedToolServer> = request
            .agent
            .tool_servers
            .iter()
            .map(|def| match def {
                ToolServerDef::Process { name, command, args } => {
                    ResolvedToolServer::Process { name: name.clone(), command: command.clone(), args: args.clone() }
                }
                ToolServerDef::Http { name, url } => ResolvedToolServer::Http { name: name.clone(), url: url.clone() },
                ToolServerDef::Injected { name } => {
                    // A bare `Injected { name }` reference with no matching
                    // handle in `request.injected_tool_servers` is dropped
                    // here; the caller is expected to have supplied the
                    // handle alongside the agent-level reference.
                    request
                        .injected_tool_servers
                        .iter()
                        .find(|s| &s.name == name)
                        .cloned()
                        .map(ResolvedToolServer::InProcess)
                        .unwrap_or(ResolvedToolServer::Http { name: name.clone(), url: String::new() })
                }
            })
            .filter(|s| !matches!(s, ResolvedToolServer::Http { url, .. } if url.is_empty()))
            .collect();

        // Injected servers passed directly on the request but not
        // referenced by the agent's own tool_servers list are still
        // registered (spec.md §4.4.1: "register each as an in-process
        // tool server").
        for server in &request.injected_tool_servers {
            let already_resolved = resolved.iter().any(|r| matches!(r, ResolvedToolServer::InProcess(s) if s.name == server.name));
            if !already_resolved {
                resolved.push(ResolvedToolServer::InProcess(server.clone()));
            }
        }
        resolved
    }
}

#[async_trait]
impl<P: ProviderClient> Runtime for DirectRuntime<P> {
    async fn run(&self, request: RunRequest) -> Result<MessageStream, RuntimeInitError> {
        if request.cancellation_token.is_cancelled() {
            return Err(RuntimeInitError::Cancelled);
        }

        let mcp_servers = Self::resolve_tool_servers(&request);
        let options = ProviderOptions {
            prompt: request.prompt.clone(),
            permission_mode: request.agent.permission_mode,
            allowed_tools: request.effective_allowed_tools(),
            denied_tools: request.agent.tools.denied_tools.iter().cloned().collect(),
            model: request.agent.model.clone(),
            working_dir: request.agent.working_dir.clone(),
            mcp_servers,
            resume_session_id: request.resume_session.as_ref().map(|s| s.as_str().to_string()),
            fork: request.fork,
        };

        self.provider.start(options).await
    }
}
