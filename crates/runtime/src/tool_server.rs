// SPDX-License-Identifier: MIT

//! In-process tool-server definitions injected into a Runtime
//! (spec.md §4.4.1, §4.5).
//!
//! An `InjectedToolServer` is a small set of named tool handlers that
//! live in the supervisor's own process. For `DirectRuntime` they are
//! registered with the provider library directly; for a containerized
//! runtime they are exposed to the container over the [`crate::bridge`]
//! HTTP transport, but the handler closure itself always runs here, on
//! the host (Design Notes §9: "invocations always run in the host
//! process").

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Error returned by a tool handler invocation.
#[derive(Debug, Clone)]
pub struct ToolCallError(pub String);

impl std::fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ToolCallError {}

/// JSON-Schema-shaped description of one tool, as returned by
/// `tools/list` (spec.md §4.5).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

pub type ToolCallFuture = Pin<Box<dyn Future<Output = Result<Value, ToolCallError>> + Send>>;
pub type ToolHandler = Arc<dyn Fn(Value) -> ToolCallFuture + Send + Sync>;

/// One named, in-process tool server (spec.md §4.4.1).
#[derive(Clone)]
pub struct InjectedToolServer {
    pub name: String,
    pub version: String,
    tools: Vec<(ToolDefinition, ToolHandler)>,
}

impl InjectedToolServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), tools: Vec::new() }
    }

    pub fn with_tool(mut self, definition: ToolDefinition, handler: ToolHandler) -> Self {
        self.tools.push((definition, handler));
        self
    }

    pub fn tools(&self) -> &[(ToolDefinition, ToolHandler)] {
        &self.tools
    }

    pub fn tool(&self, name: &str) -> Option<&(ToolDefinition, ToolHandler)> {
        self.tools.iter().find(|(def, _)| def.name == name)
    }

    /// The allow-list glob this server's tools are registered under
    /// (spec.md §4.4.1): `mcp__<server>__*`.
    pub fn allow_pattern(&self) -> String {
        format!("mcp__{}__*", self.name)
    }
}

/// A file-upload-style handler must reject paths that, after resolution
/// relative to `working_dir`, escape it (spec.md §4.5's "file-sender
/// security rule"). Returns `Err` with the mandated message when the
/// path escapes; `Ok(canonical path)` otherwise. The handler must check
/// this *before* reading the file.
pub fn reject_path_escaping_working_dir(
    working_dir: &std::path::Path,
    relative_path: &str,
) -> Result<std::path::PathBuf, ToolCallError> {
    let candidate = working_dir.join(relative_path);
    let normalized = normalize_lexically(&candidate);
    if normalized.starts_with(working_dir) {
        Ok(normalized)
    } else {
        Err(ToolCallError("escapes working directory".to_string()))
    }
}

/// Lexical `..`/`.` resolution without touching the filesystem (the
/// path may not exist yet), mirroring what `std::fs::canonicalize`
/// would do for an existing path.
fn normalize_lexically(path: &std::path::Path) -> std::path::PathBuf {
    use std::path::Component;
    let mut out = std::path::PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_within_working_dir_is_accepted() {
        let dir = std::path::Path::new("/work/agent-a");
        let resolved = reject_path_escaping_working_dir(dir, "x/y.txt").unwrap();
        assert_eq!(resolved, std::path::PathBuf::from("/work/agent-a/x/y.txt"));
    }

    #[test]
    fn traversal_outside_working_dir_is_rejected() {
        let dir = std::path::Path::new("/work/agent-a");
        let err = reject_path_escaping_working_dir(dir, "../../../etc/passwd").unwrap_err();
        assert_eq!(err.0, "escapes working directory");
    }

    #[test]
    fn allow_pattern_matches_spec_glob_form() {
        let server = InjectedToolServer::new("search", "1.0");
        assert_eq!(server.allow_pattern(), "mcp__search__*");
    }
}
