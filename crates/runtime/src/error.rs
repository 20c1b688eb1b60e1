// SPDX-License-Identifier: MIT

//! Runtime error taxonomy (spec.md §4.4, §7).

use thiserror::Error;

/// Raised when a Runtime cannot even start (spec.md §7
/// `RuntimeInitializationError`): credentials missing, external binary
/// absent, container could not be created.
#[derive(Debug, Error)]
pub enum RuntimeInitError {
    #[error("provider CLI binary not found: {0}")]
    CliNotFound(String),
    #[error("failed to spawn provider process: {0}")]
    SpawnFailed(String),
    #[error("failed to acquire container for agent {agent}: {reason}")]
    ContainerUnavailable { agent: String, reason: String },
    #[error("provider library call failed to start: {0}")]
    ProviderUnavailable(String),
    #[error("run was cancelled before it started")]
    Cancelled,
}

/// Raised for a failure mid-stream (spec.md §7 `RuntimeStreamingError`),
/// surfaced to the caller as a single synthetic record appended to the
/// job's message log rather than an exception that unwinds past the
/// Runtime boundary.
#[derive(Debug, Error, Clone)]
pub enum StreamFault {
    #[error("child process exited with status {0}")]
    NonZeroExit(i32),
    #[error("{0}")]
    Generic(String),
    #[error("run was cancelled")]
    Cancelled,
}

impl StreamFault {
    /// The error `code` field spec.md §4.4.2 assigns a non-zero child
    /// exit with no prior error message: `EXIT_<n>`.
    pub fn code(&self) -> Option<String> {
        match self {
            StreamFault::NonZeroExit(n) => Some(format!("EXIT_{n}")),
            StreamFault::Cancelled => Some("CANCELLED".to_string()),
            StreamFault::Generic(_) => None,
        }
    }
}
