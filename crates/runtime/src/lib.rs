// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Runtime abstraction (spec.md §4.4): a uniform, cancellable way to
//! run one agent invocation and receive its message stream back,
//! regardless of whether that invocation happens in-process, as a
//! spawned CLI, or inside a container.

mod bridge;
mod container;
mod direct;
mod error;
mod external;
mod provider;
mod request;
mod tool_server;

pub use bridge::ToolServerBridge;
pub use container::{ContainerRunner, ContainerWorkload};
pub use direct::DirectRuntime;
pub use error::{RuntimeInitError, StreamFault};
pub use external::ExternalRuntime;
pub use provider::{ProviderClient, ProviderOptions, ResolvedToolServer};
pub use request::RunRequest;
pub use tool_server::{reject_path_escaping_working_dir, InjectedToolServer, ToolCallError, ToolCallFuture, ToolDefinition, ToolHandler};

/// The heterogeneous stream of raw provider records a [`Runtime`]
/// yields. Normalizing this into `herdctl_core::Message` is
/// `herdctl-message`'s job, not this crate's (spec.md §4.4, §4.5.1).
pub type MessageStream = tokio_stream::wrappers::ReceiverStream<serde_json::Value>;

/// One agent invocation, in any of its three execution shapes
/// (spec.md §4.4): in-process, spawned CLI, or containerized.
///
/// A Runtime yields a lazy, finite, non-restartable, cancellable
/// stream: lazy because nothing runs before `run` is awaited, finite
/// because the stream ends when the underlying process/call
/// completes, non-restartable because a second `run` call with the
/// same request starts an entirely new invocation rather than resuming
/// the first, and cancellable via the `CancellationToken` embedded in
/// [`RunRequest`].
#[async_trait::async_trait]
pub trait Runtime: Send + Sync {
    async fn run(&self, request: RunRequest) -> Result<MessageStream, RuntimeInitError>;
}
