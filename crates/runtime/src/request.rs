// SPDX-License-Identifier: MIT

//! The uniform request shape every [`crate::Runtime`] implementation
//! accepts (spec.md §4.4).

use crate::tool_server::InjectedToolServer;
use herdctl_core::{Agent, SessionId};
use tokio_util::sync::CancellationToken;

/// Input to one Runtime invocation.
#[derive(Clone)]
pub struct RunRequest {
    pub prompt: String,
    pub agent: Agent,
    pub resume_session: Option<SessionId>,
    pub fork: bool,
    pub injected_tool_servers: Vec<InjectedToolServer>,
    pub cancellation_token: CancellationToken,
}

impl RunRequest {
    pub fn new(prompt: impl Into<String>, agent: Agent, cancellation_token: CancellationToken) -> Self {
        Self {
            prompt: prompt.into(),
            agent,
            resume_session: None,
            fork: false,
            injected_tool_servers: Vec::new(),
            cancellation_token,
        }
    }

    pub fn with_resume(mut self, session_id: Option<SessionId>) -> Self {
        self.resume_session = session_id;
        self
    }

    pub fn with_fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    pub fn with_injected_tool_servers(mut self, servers: Vec<InjectedToolServer>) -> Self {
        self.injected_tool_servers = servers;
        self
    }

    /// Allowed-tool patterns after auto-extending for every injected
    /// server (spec.md §4.4.1).
    pub fn effective_allowed_tools(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.agent.tools.allowed_tools.iter().cloned().collect();
        for server in &self.injected_tool_servers {
            patterns.push(server.allow_pattern());
        }
        patterns
    }
}
