// SPDX-License-Identifier: MIT

//! Container decorator: wraps either runtime kind to execute inside a
//! per-agent hardened container (spec.md §4.4.3).
//!
//! This is a decorator in the design sense (Design Notes §9) rather
//! than in the class-inheritance sense: it composes against the same
//! [`Runtime`] contract every other implementation does, and the two
//! wrapped execution styles (`exec` a CLI vs. run an in-container
//! wrapper around the provider library) are selected by
//! [`ContainerWorkload`] rather than by trait-object dispatch into the
//! un-containerized runtime, because the two styles differ enough in
//! how they talk to the container that sharing a single `run` body
//! would just be a match on workload kind in disguise.

use crate::bridge::ToolServerBridge;
use crate::error::RuntimeInitError;
use crate::external::encode_workspace_path;
use crate::request::RunRequest;
use crate::{MessageStream, Runtime};
use async_trait::async_trait;
use herdctl_core::{AgentName, ContainerLifecycle, ContainerizationConfig, FleetContainerOverrides};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Host alias containers use to reach back into the supervisor process
/// for injected tool servers (spec.md §4.4.3).
const HOST_ALIAS: &str = "host.docker.internal";

/// Which style of invocation this decorator runs inside the container
/// (spec.md §4.4.3).
#[derive(Clone)]
pub enum ContainerWorkload {
    /// `docker exec` the provider CLI, prompt piped via stdin.
    External { binary: String },
    /// `docker exec` a small in-container wrapper that loads the
    /// provider library and writes one JSON line per message to
    /// stdout.
    Direct { wrapper_binary: String },
}

#[derive(Default)]
struct ContainerState {
    /// Persistent containers, keyed by agent name, reused across jobs.
    persistent: HashMap<AgentName, String>,
}

pub struct ContainerRunner {
    workload: ContainerWorkload,
    /// Host directory `docker-sessions/` lives under (spec.md §6).
    host_sessions_root: PathBuf,
    /// Fleet-level isolation-weakening overrides (spec.md §7): supplied
    /// once by whoever owns the fleet configuration, never derived from
    /// a per-job request.
    overrides: FleetContainerOverrides,
    state: Arc<Mutex<ContainerState>>,
}

impl ContainerRunner {
    pub fn new(workload: ContainerWorkload, host_sessions_root: impl Into<PathBuf>) -> Self {
        Self {
            workload,
            host_sessions_root: host_sessions_root.into(),
            overrides: FleetContainerOverrides::default(),
            state: Arc::new(Mutex::new(ContainerState::default())),
        }
    }

    pub fn with_fleet_overrides(mut self, overrides: FleetContainerOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    async fn acquire_container(&self, request: &RunRequest, job_id_hint: &str) -> Result<(String, bool), RuntimeInitError> {
        let config = request.agent.containerization.clone().unwrap_or_default();
        match config.lifecycle {
            ContainerLifecycle::Persistent => {
                let existing = self.state.lock().persistent.get(&request.agent.name).cloned();
                if let Some(name) = existing {
                    if container_is_running(&name).await {
                        return Ok((name, false));
                    }
                }
                let name = format!("herdctl-{}", request.agent.name);
                self.create_container(&name, request, &config, false).await?;
                self.state.lock().persistent.insert(request.agent.name.clone(), name.clone());
                Ok((name, false))
            }
            ContainerLifecycle::Ephemeral => {
                let name = format!("herdctl-{}-{job_id_hint}", request.agent.name);
                self.create_container(&name, request, &config, true).await?;
                Ok((name, true))
            }
        }
    }

    async fn create_container(
        &self,
        name: &str,
        request: &RunRequest,
        config: &ContainerizationConfig,
        ephemeral: bool,
    ) -> Result<(), RuntimeInitError> {
        let args = build_run_args(name, request, config, &self.overrides, &self.host_sessions_root, ephemeral);
        run_docker(&args)
            .await
            .map_err(|reason| RuntimeInitError::ContainerUnavailable { agent: request.agent.name.to_string(), reason })?;
        Ok(())
    }

    async fn cleanup(&self, request: &RunRequest, container_name: &str, ephemeral: bool) {
        if ephemeral {
            let _ = run_docker(&["stop", container_name]).await;
            return;
        }
        let config = request.agent.containerization.clone().unwrap_or_default();
        let _ = prune_old_containers(&request.agent.name, config.max_containers).await;
    }
}

#[async_trait]
impl Runtime for ContainerRunner {
    async fn run(&self, request: RunRequest) -> Result<MessageStream, RuntimeInitError> {
        if request.cancellation_token.is_cancelled() {
            return Err(RuntimeInitError::Cancelled);
        }

        let job_hint = format!("{:08x}", rand::random::<u32>());
        let (container_name, ephemeral) = self.acquire_container(&request, &job_hint).await?;

        // Start an HTTP bridge for every injected tool server so the
        // container reaches back into this process (spec.md §4.4.3,
        // §4.5).
        let mut bridges = Vec::new();
        for server in &request.injected_tool_servers {
            let bridge = ToolServerBridge::start(server.clone(), request.agent.working_dir.clone().unwrap_or_else(|| PathBuf::from(".")))
                .await
                .map_err(|e| RuntimeInitError::ContainerUnavailable { agent: request.agent.name.to_string(), reason: e })?;
            bridges.push(bridge);
        }

        let (tx, rx) = mpsc::channel(256);
        let workload = self.workload.clone();
        let runner_state = self.state.clone();
        let runner_overrides = self.overrides.clone();
        let host_session_dir = self.host_sessions_root.join(encode_workspace_path(
            &request.agent.working_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
        ));
        let cancellation_token = request.cancellation_token.clone();
        let request_for_cleanup = request.clone();

        tokio::spawn(async move {
            run_in_container(workload.clone(), container_name.clone(), host_session_dir, request, cancellation_token, tx).await;
            // Ephemeral containers are already --rm'd by Docker on exit;
            // this pass only prunes the persistent-container backlog
            // and stops ephemeral ones that are still up after an error.
            let runner = ContainerRunner { workload, host_sessions_root: PathBuf::new(), overrides: runner_overrides, state: runner_state };
            runner.cleanup(&request_for_cleanup, &container_name, ephemeral).await;
            drop(bridges);
        });

        Ok(tokio_stream::wrappers::ReceiverStream::new(rx))
    }
}

async fn run_in_container(
    workload: ContainerWorkload,
    container_name: String,
    host_session_dir: PathBuf,
    request: RunRequest,
    cancellation_token: tokio_util::sync::CancellationToken,
    tx: mpsc::Sender<Value>,
) {
    match workload {
        ContainerWorkload::External { binary } => {
            run_external_exec(binary, container_name, host_session_dir, request, cancellation_token, tx).await;
        }
        ContainerWorkload::Direct { wrapper_binary } => {
            run_direct_wrapper(wrapper_binary, container_name, request, cancellation_token, tx).await;
        }
    }
}

/// `docker exec` the provider CLI inside the container, with the
/// prompt piped through stdin rather than embedded on the command line
/// (spec.md §4.4.3: "to avoid escaping pitfalls"). The session log is
/// tailed from the host, since the container's `/workspace` mount and
/// the host's working directory share the same session-log encoding.
async fn run_external_exec(
    binary: String,
    container_name: String,
    host_session_dir: PathBuf,
    request: RunRequest,
    cancellation_token: tokio_util::sync::CancellationToken,
    tx: mpsc::Sender<Value>,
) {
    let mut args = vec!["exec".to_string(), "-i".to_string(), container_name, binary, "--print".to_string()];
    if let Some(session_id) = &request.resume_session {
        args.push("--resume".to_string());
        args.push(session_id.as_str().to_string());
    }
    if request.fork {
        args.push("--fork-session".to_string());
    }

    let mut command = Command::new("docker");
    command.args(&args).stdin(Stdio::piped()).stdout(Stdio::null()).stderr(Stdio::piped());
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = tx.send(serde_json::json!({"type": "error", "message": format!("docker exec failed: {e}")})).await;
            return;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(request.prompt.as_bytes()).await;
        drop(stdin);
    }

    let spawned_at = std::time::SystemTime::now();
    let _ = std::fs::create_dir_all(&host_session_dir);
    let log_path = crate::external::discover_log_file(&host_session_dir, spawned_at)
        .await
        .unwrap_or_else(|| host_session_dir.join("session.jsonl"));

    crate::external::tail_and_wait(log_path, child, cancellation_token, tx).await;
}

/// `docker exec` a small in-container wrapper that loads the provider
/// library and writes one JSON message per stdout line (spec.md
/// §4.4.3); this decorator parses that stream directly rather than
/// tailing a file.
async fn run_direct_wrapper(
    wrapper_binary: String,
    container_name: String,
    request: RunRequest,
    cancellation_token: tokio_util::sync::CancellationToken,
    tx: mpsc::Sender<Value>,
) {
    let mut args = vec!["exec".to_string(), "-i".to_string(), container_name, wrapper_binary];
    if let Some(model) = &request.agent.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    if let Some(session_id) = &request.resume_session {
        args.push("--resume".to_string());
        args.push(session_id.as_str().to_string());
    }

    let mut command = Command::new("docker");
    command.args(&args).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = tx.send(serde_json::json!({"type": "error", "message": format!("docker exec failed: {e}")})).await;
            return;
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(request.prompt.as_bytes()).await;
        drop(stdin);
    }

    let stdout = child.stdout.take();
    let mut lines = stdout.map(|s| BufReader::new(s).lines());

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                let _ = child.start_kill();
                let _ = tx.send(serde_json::json!({"type": "error", "message": "run was cancelled", "code": "CANCELLED"})).await;
                return;
            }
            line = async { if let Some(lines) = lines.as_mut() { lines.next_line().await } else { std::future::pending().await } } => {
                match line {
                    Ok(Some(line)) => {
                        let value: Value = serde_json::from_str(&line).unwrap_or_else(|_| Value::String(line));
                        if tx.send(value).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
            status = child.wait() => {
                if let Ok(status) = status {
                    if !status.success() {
                        let code = status.code().unwrap_or(-1);
                        let _ = tx.send(serde_json::json!({"type": "error", "message": format!("wrapper exited with status {code}"), "code": format!("EXIT_{code}")})).await;
                    }
                }
                return;
            }
        }
    }

    let _ = child.wait().await;
}

/// Fields that can weaken isolation come only from `overrides`
/// (spec.md §7's trust boundary); `config` never carries them.
fn build_run_args(
    name: &str,
    request: &RunRequest,
    config: &ContainerizationConfig,
    overrides: &FleetContainerOverrides,
    host_sessions_root: &PathBuf,
    ephemeral: bool,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["run".to_string(), "-d".to_string(), "--name".to_string(), name.to_string()];
    if ephemeral {
        args.push("--rm".to_string());
    }

    args.push("--cap-drop".to_string());
    args.push("ALL".to_string());
    args.push("--security-opt".to_string());
    args.push("no-new-privileges".to_string());

    let user = config.user.clone().unwrap_or_else(default_host_user);
    args.push("--user".to_string());
    args.push(format!("{}:{}", user.uid, user.gid));

    if let Some(credential_mount) = &config.credential_mount {
        args.push("-v".to_string());
        args.push(format!("{}:/credentials:ro", credential_mount.display()));
    }

    let working_dir = request.agent.working_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let workspace_mode = if config.workspace_read_only { "ro" } else { "rw" };
    args.push("-v".to_string());
    args.push(format!("{}:/workspace:{workspace_mode}", working_dir.display()));

    let host_session_dir = host_sessions_root.join(encode_workspace_path(&working_dir));
    args.push("-v".to_string());
    args.push(format!("{}:{}", host_session_dir.display(), container_session_path()));

    if let Some(pids_limit) = config.resources.pids_limit {
        args.push("--pids-limit".to_string());
        args.push(pids_limit.to_string());
    }
    if let Some(cpus) = config.resources.cpus {
        args.push("--cpus".to_string());
        args.push(cpus.to_string());
    }
    if let Some(memory_bytes) = config.resources.memory_bytes {
        args.push("--memory".to_string());
        args.push(memory_bytes.to_string());
    }

    // Fleet-level-only escape hatches (spec.md §7).
    if let Some(image) = &overrides.image {
        args.push("--add-host".to_string());
        args.push(format!("{HOST_ALIAS}:host-gateway"));
        args.push(image.clone());
    } else {
        args.push("--add-host".to_string());
        args.push(format!("{HOST_ALIAS}:host-gateway"));
        args.push("herdctl-agent:latest".to_string());
    }
    if let Some(network_mode) = &overrides.network_mode {
        args.push("--network".to_string());
        args.push(network_mode.clone());
    }
    for mount in &overrides.extra_mounts {
        let mode = if mount.read_only { "ro" } else { "rw" };
        args.push("-v".to_string());
        args.push(format!("{}:{}:{mode}", mount.host_path.display(), mount.container_path.display()));
    }
    for (key, value) in &overrides.extra_env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    // Merged last, verbatim, per spec.md §4.4.3.
    for (flag, value) in &overrides.raw_host_config {
        args.push(format!("--{flag}"));
        args.push(value.to_string());
    }
    args.push("sleep".to_string());
    args.push("infinity".to_string());

    args
}

fn container_session_path() -> &'static str {
    "/root/.herdctl/sessions"
}

fn default_host_user() -> herdctl_core::ContainerUser {
    herdctl_core::ContainerUser { uid: host_uid(), gid: host_gid() }
}

#[cfg(unix)]
fn host_uid() -> u32 {
    nix::unistd::Uid::current().as_raw()
}
#[cfg(unix)]
fn host_gid() -> u32 {
    nix::unistd::Gid::current().as_raw()
}
#[cfg(not(unix))]
fn host_uid() -> u32 {
    1000
}
#[cfg(not(unix))]
fn host_gid() -> u32 {
    1000
}

async fn container_is_running(name: &str) -> bool {
    matches!(
        run_docker(&["inspect", "-f", "{{.State.Running}}", name]).await,
        Ok(out) if out.trim() == "true"
    )
}

async fn prune_old_containers(agent: &AgentName, max_containers: u32) -> Result<(), String> {
    let filter = format!("name=herdctl-{agent}");
    let listing = run_docker(&["ps", "-a", "--filter", &filter, "--format", "{{.CreatedAt}}\t{{.Names}}"]).await?;
    let mut rows: Vec<&str> = listing.lines().collect();
    rows.sort();
    if rows.len() as u32 <= max_containers {
        return Ok(());
    }
    let excess = rows.len() as u32 - max_containers;
    for row in rows.drain(..excess as usize) {
        if let Some(name) = row.split('\t').nth(1) {
            let _ = run_docker(&["rm", "-f", name]).await;
        }
    }
    Ok(())
}

async fn run_docker(args: &[&str]) -> Result<String, String> {
    let output = Command::new("docker").args(args).output().await.map_err(|e| format!("failed to exec docker: {e}"))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(format!("docker {} failed: {}", args.first().unwrap_or(&""), String::from_utf8_lossy(&output.stderr).trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardened_defaults_are_always_present() {
        let request_agent = test_agent();
        let config = ContainerizationConfig::default();
        let overrides = FleetContainerOverrides::default();
        let args = build_run_args(
            "herdctl-alpha",
            &sample_request(request_agent),
            &config,
            &overrides,
            &PathBuf::from("/var/herdctl/docker-sessions"),
            true,
        );
        assert!(args.windows(2).any(|w| w == ["--cap-drop", "ALL"]));
        assert!(args.iter().any(|a| a == "no-new-privileges"));
        assert!(args.iter().any(|a| a.contains(":/workspace:")));
    }

    #[test]
    fn fleet_overrides_are_merged_last() {
        let mut overrides = FleetContainerOverrides::default();
        overrides.image = Some("custom:image".to_string());
        let agent = test_agent();
        let args = build_run_args(
            "herdctl-alpha",
            &sample_request(agent),
            &ContainerizationConfig::default(),
            &overrides,
            &PathBuf::from("/var/herdctl/docker-sessions"),
            true,
        );
        assert_eq!(args.last().unwrap(), "infinity");
        assert!(args.iter().any(|a| a == "custom:image"));
    }

    fn test_agent() -> herdctl_core::Agent {
        herdctl_core::Agent {
            name: AgentName::new("alpha"),
            prompt: "hi".into(),
            working_dir: Some(PathBuf::from("/home/op/alpha")),
            runtime_kind: herdctl_core::RuntimeKind::External,
            containerization: None,
            schedules: vec![],
            max_concurrent: 1,
            session_timeout: std::time::Duration::from_secs(60),
            permission_mode: herdctl_core::PermissionMode::Default,
            tools: herdctl_core::ToolPermissions::default(),
            model: None,
            tool_servers: vec![],
        }
    }

    fn sample_request(agent: herdctl_core::Agent) -> RunRequest {
        RunRequest::new("hi", agent, tokio_util::sync::CancellationToken::new())
    }
}
