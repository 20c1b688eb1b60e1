// SPDX-License-Identifier: MIT

//! Out-of-process runtime: spawns the provider CLI as a child process
//! and tails the JSONL session log it writes (spec.md §4.4.2).

use crate::error::RuntimeInitError;
use crate::request::RunRequest;
use crate::{MessageStream, Runtime};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// How long to wait for the session log file to appear after spawn
/// before giving up (spec.md §4.4.2: "≈500 ms").
const LOG_APPEARANCE_TIMEOUT: Duration = Duration::from_millis(500);
/// Write-settle debounce applied to filesystem watch events before a
/// tail read (spec.md §4.4.2, Design Notes §9).
const WATCH_SETTLE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Encode a working directory into the session-log directory name the
/// provider CLI uses, the way `docker-sessions/…` encodes `/workspace`
/// as `-workspace` (spec.md §6): every path separator becomes `-`.
pub fn encode_workspace_path(working_dir: &Path) -> String {
    let text = working_dir.to_string_lossy();
    let mut encoded = text.replace(std::path::MAIN_SEPARATOR, "-");
    if !encoded.starts_with('-') {
        encoded.insert(0, '-');
    }
    encoded
}

/// Spawns the provider command-line tool and tails its session log.
pub struct ExternalRuntime {
    /// Path (or bare name, resolved via `PATH`) to the provider CLI.
    binary: String,
    /// Root directory the provider writes per-session JSONL logs
    /// under, one subdirectory per encoded working directory.
    sessions_root: PathBuf,
}

impl ExternalRuntime {
    pub fn new(binary: impl Into<String>, sessions_root: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), sessions_root: sessions_root.into() }
    }

    fn session_log_dir(&self, request: &RunRequest) -> PathBuf {
        let working_dir = request.agent.working_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        self.sessions_root.join(encode_workspace_path(&working_dir))
    }

    fn build_args(request: &RunRequest) -> Vec<String> {
        let mut args = vec!["--print".to_string(), request.prompt.clone()];
        if let Some(session_id) = &request.resume_session {
            args.push("--resume".to_string());
            args.push(session_id.as_str().to_string());
        }
        if request.fork {
            args.push("--fork-session".to_string());
        }
        if matches!(request.agent.permission_mode, herdctl_core::PermissionMode::BypassPermissions) {
            args.push("--dangerously-skip-permissions".to_string());
        }
        args
    }

}

/// Find the newest session log file created strictly after
/// `spawned_at`, tolerating the small race where the CLI creates the
/// file a little after the process itself starts (spec.md §4.4.2:
/// "discovers the newest matching file created after the spawn
/// time"). Shared with [`crate::container`], which tails the same kind
/// of host-mirrored session log for an externally-invoked provider CLI
/// running inside a container.
pub(crate) async fn discover_log_file(dir: &Path, spawned_at: std::time::SystemTime) -> Option<PathBuf> {
    let deadline = Instant::now() + LOG_APPEARANCE_TIMEOUT;
    loop {
        if let Some(path) = newest_jsonl_after(dir, spawned_at) {
            return Some(path);
        }
        if Instant::now() >= deadline {
            return newest_jsonl_after(dir, spawned_at);
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn newest_jsonl_after(dir: &Path, spawned_at: std::time::SystemTime) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|ext| ext.to_str()) == Some("jsonl"))
        .filter_map(|e| {
            let created = e.metadata().ok()?.created().ok()?;
            (created >= spawned_at).then_some((created, e.path()))
        })
        .max_by_key(|(created, _)| *created)
        .map(|(_, path)| path)
}

#[async_trait]
impl Runtime for ExternalRuntime {
    async fn run(&self, request: RunRequest) -> Result<MessageStream, RuntimeInitError> {
        if which_on_path(&self.binary).is_none() && !Path::new(&self.binary).exists() {
            return Err(RuntimeInitError::CliNotFound(self.binary.clone()));
        }
        if request.cancellation_token.is_cancelled() {
            return Err(RuntimeInitError::Cancelled);
        }

        let log_dir = self.session_log_dir(&request);
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| RuntimeInitError::SpawnFailed(format!("creating session log dir: {e}")))?;

        let spawned_at = std::time::SystemTime::now();
        let working_dir = request.agent.working_dir.clone();
        let mut command = Command::new(&self.binary);
        command.args(Self::build_args(&request));
        if let Some(dir) = &working_dir {
            command.current_dir(dir);
        }
        command.kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| RuntimeInitError::SpawnFailed(e.to_string()))?;

        let log_path = discover_log_file(&log_dir, spawned_at)
            .await
            .unwrap_or_else(|| log_dir.join(format!("{}.jsonl", std::process::id())));

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(tail_and_wait(log_path, child, request.cancellation_token.clone(), tx));

        Ok(tokio_stream::wrappers::ReceiverStream::new(rx))
    }
}

fn which_on_path(binary: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var).map(|dir| dir.join(binary)).find(|candidate| candidate.is_file())
}

/// Drives one job's worth of tailing: watches `log_path` for new
/// lines, forwards each as a `Value`, and on child exit performs the
/// mandatory final flush read (spec.md §4.4.2) before emitting a
/// synthetic error for a non-zero exit with no prior error message.
pub(crate) async fn tail_and_wait(
    log_path: PathBuf,
    mut child: tokio::process::Child,
    cancellation_token: tokio_util::sync::CancellationToken,
    tx: mpsc::Sender<Value>,
) {
    let mut last_line_count = 0usize;
    let (watch_tx, mut watch_rx) = mpsc::channel::<()>(64);
    let _watcher = spawn_watcher(&log_path, watch_tx);

    let mut saw_error_message = false;
    let mut fault: Option<crate::error::StreamFault> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                let _ = child.start_kill();
                fault = Some(crate::error::StreamFault::Cancelled);
                break;
            }
            status = child.wait() => {
                match status {
                    Ok(status) if !status.success() => {
                        fault = Some(crate::error::StreamFault::NonZeroExit(status.code().unwrap_or(-1)));
                    }
                    Err(e) => {
                        fault = Some(crate::error::StreamFault::Generic(e.to_string()));
                    }
                    Ok(_) => {}
                }
                break;
            }
            signal = watch_rx.recv() => {
                if signal.is_none() {
                    continue;
                }
                // Settle debounce: coalesce a burst of writes into one read.
                while tokio::time::timeout(WATCH_SETTLE_DEBOUNCE, watch_rx.recv()).await.is_ok() {}
                saw_error_message |= flush_new_lines(&log_path, &tx, &mut last_line_count).await;
            }
        }
    }

    // Final flush: records written between the last watcher event and
    // child exit must not be lost (spec.md §4.4.2).
    saw_error_message |= flush_new_lines(&log_path, &tx, &mut last_line_count).await;

    if let Some(fault) = fault {
        if !saw_error_message {
            let message = fault.to_string();
            let code = fault.code();
            let _ = tx
                .send(serde_json::json!({"type": "error", "message": message, "code": code}))
                .await;
        }
    }
}

/// Returns `true` if any of the newly read lines was itself an `error`
/// record, so the caller knows whether a synthetic one is still owed.
async fn flush_new_lines(path: &Path, tx: &mpsc::Sender<Value>, last_line_count: &mut usize) -> bool {
    let Ok(contents) = tokio::fs::read_to_string(path).await else {
        return false;
    };
    let lines: Vec<&str> = contents.lines().collect();
    if lines.len() <= *last_line_count {
        return false;
    }

    let mut saw_error = false;
    for line in &lines[*last_line_count..] {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).unwrap_or_else(|_| Value::String(line.to_string()));
        saw_error |= value.get("type").and_then(Value::as_str) == Some("error");
        if tx.send(value).await.is_err() {
            break;
        }
    }
    *last_line_count = lines.len();
    saw_error
}

fn spawn_watcher(path: &Path, signal_tx: mpsc::Sender<()>) -> Option<notify::RecommendedWatcher> {
    let watch_dir = path.parent()?.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if res.is_ok() {
            let _ = signal_tx.blocking_send(());
        }
    })
    .ok()?;
    notify::Watcher::watch(&mut watcher, &watch_dir, notify::RecursiveMode::NonRecursive).ok()?;
    Some(watcher)
}
