// SPDX-License-Identifier: MIT

//! MCP tool-server HTTP bridge (spec.md §4.5).
//!
//! Exposes one [`InjectedToolServer`] over a JSON-RPC 2.0 surface on a
//! random free host port, so a containerized runtime (spec.md §4.4.3)
//! can reach back into the supervisor process for tool calls it cannot
//! make itself. The handler closures always run here, in the host
//! process (Design Notes §9); the bridge is just transport.

use crate::tool_server::InjectedToolServer;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const PROTOCOL_VERSION: &str = "2024-11-05";

struct BridgeState {
    server: InjectedToolServer,
    working_dir: PathBuf,
}

/// A running bridge instance. Dropping it stops the HTTP listener.
pub struct ToolServerBridge {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl ToolServerBridge {
    pub async fn start(server: InjectedToolServer, working_dir: PathBuf) -> Result<Self, String> {
        let listener = TcpListener::bind("0.0.0.0:0").await.map_err(|e| format!("binding mcp bridge port: {e}"))?;
        let addr = listener.local_addr().map_err(|e| format!("reading bridge local addr: {e}"))?;

        let state = Arc::new(BridgeState { server, working_dir });
        let app = Router::new().route("/mcp", post(handle_rpc)).with_state(state);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join_handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self { port: addr.port(), shutdown: Some(shutdown_tx), join_handle: Some(join_handle) })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL the container should reach this bridge at, via the Docker
    /// host-gateway alias (spec.md §4.4.3).
    pub fn container_url(&self, host_alias: &str) -> String {
        format!("http://{host_alias}:{}/mcp", self.port)
    }
}

impl Drop for ToolServerBridge {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            handle.abort();
        }
    }
}

async fn handle_rpc(State(state): State<Arc<BridgeState>>, Json(request): Json<Value>) -> Json<Value> {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");
    let params = request.get("params").cloned().unwrap_or(Value::Null);

    // `notifications/initialized` carries no `id` and expects no reply
    // body the caller waits on; still ack with an empty success so the
    // HTTP round trip itself completes (spec.md §4.5).
    let result = match method {
        "initialize" => Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": state.server.name, "version": state.server.version },
        })),
        "notifications/initialized" => Ok(Value::Null),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({
            "tools": state.server.tools().iter().map(|(def, _)| json!({
                "name": def.name,
                "description": def.description,
                "inputSchema": def.input_schema,
            })).collect::<Vec<_>>()
        })),
        "tools/call" => handle_tool_call(&state, params).await,
        _ => return Json(rpc_error(id, -32601, "method not found")),
    };

    match result {
        Ok(value) => Json(json!({"jsonrpc": "2.0", "id": id, "result": value})),
        Err(message) => Json(rpc_error(id, -32000, &message)),
    }
}

async fn handle_tool_call(state: &BridgeState, params: Value) -> Result<Value, String> {
    let name = params.get("name").and_then(Value::as_str).ok_or_else(|| "missing tool name".to_string())?;
    let arguments = translate_workspace_paths(params.get("arguments").cloned().unwrap_or(json!({})), &state.working_dir);

    let (_, handler) = state.server.tool(name).ok_or_else(|| format!("unknown tool: {name}"))?;
    (*handler)(arguments).await.map_err(|e| e.to_string())
}

/// Rewrites the `file_path` argument's `/workspace/...` value to a path
/// relative to the host working directory, and a bare `/workspace` to
/// `.` (spec.md §4.5: "any argument named `file_path`"): the container
/// sees its own mount point, but handlers run on the host and need
/// host-relative paths. Every other string argument (e.g. `note`,
/// `query`) is left exactly as the caller sent it, even if it happens
/// to start with `/workspace`.
fn translate_workspace_paths(value: Value, working_dir: &Path) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(|v| translate_workspace_paths(v, working_dir)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, v)| {
                    let v = if key == "file_path" {
                        match v {
                            Value::String(s) => Value::String(translate_one(&s, working_dir)),
                            other => other,
                        }
                    } else {
                        translate_workspace_paths(v, working_dir)
                    };
                    (key, v)
                })
                .collect(),
        ),
        other => other,
    }
}

fn translate_one(value: &str, working_dir: &Path) -> String {
    if value == "/workspace" {
        ".".to_string()
    } else if let Some(rest) = value.strip_prefix("/workspace/") {
        rest.to_string()
    } else {
        let _ = working_dir;
        value.to_string()
    }
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}
