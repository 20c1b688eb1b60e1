// SPDX-License-Identifier: MIT

//! Stand-in provider CLI for the black-box specs under `tests/specs/`.
//!
//! `herdctl-runtime::ExternalRuntime` shells out to a real model CLI and
//! tails the session-log file it writes; this binary mimics that
//! contract (same argv shape, same session-log layout under a
//! `sessions_root/<encoded-workdir>/<pid>.jsonl` file) so the specs can
//! drive a full `herdctld` without a real provider. Controlled through
//! environment variables, since `ExternalRuntime::build_args` leaves no
//! room for extra flags:
//!
//! - `FAKE_AGENT_SESSIONS_ROOT` (required): mirrors `RuntimeFactory::sessions_root`.
//! - `FAKE_AGENT_BEHAVIOR`: `success` (default), `fail`, `hang`, `malformed`.

use std::io::Write;
use std::path::{Path, PathBuf};

fn encode_workspace_path(working_dir: &Path) -> String {
    let text = working_dir.to_string_lossy();
    let mut encoded = text.replace(std::path::MAIN_SEPARATOR, "-");
    if !encoded.starts_with('-') {
        encoded.insert(0, '-');
    }
    encoded
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let prompt = args.iter().position(|a| a == "--print").and_then(|i| args.get(i + 1)).cloned().unwrap_or_default();
    let resume = args.iter().position(|a| a == "--resume").and_then(|i| args.get(i + 1)).cloned();

    let sessions_root = PathBuf::from(
        std::env::var("FAKE_AGENT_SESSIONS_ROOT").expect("FAKE_AGENT_SESSIONS_ROOT must be set by the test harness"),
    );
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let log_dir = sessions_root.join(encode_workspace_path(&cwd));
    std::fs::create_dir_all(&log_dir).expect("creating session log dir");
    let log_path = log_dir.join(format!("{}.jsonl", std::process::id()));
    let mut file = std::fs::File::create(&log_path).expect("creating session log file");

    let session_id = resume.unwrap_or_else(|| format!("fake-session-{}", std::process::id()));
    writeln!(file, r#"{{"type":"system","subtype":"init","session_id":"{session_id}"}}"#).unwrap();
    file.flush().unwrap();

    match std::env::var("FAKE_AGENT_BEHAVIOR").unwrap_or_else(|_| "success".to_string()).as_str() {
        "hang" => loop {
            std::thread::sleep(std::time::Duration::from_secs(3600));
        },
        "fail" => {
            writeln!(file, r#"{{"type":"error","message":"fake failure for {prompt}"}}"#).unwrap();
            file.flush().unwrap();
            std::process::exit(1);
        }
        "malformed" => {
            // spec.md §8 scenario 4: malformed records interleaved with
            // well-formed ones, all must still reach the message log.
            writeln!(file, "null").unwrap();
            writeln!(file, r#"{{"content":"missing type"}}"#).unwrap();
            writeln!(file, r#"{{"type":"unexpected","content":"x"}}"#).unwrap();
            writeln!(file, r#"{{"type":"assistant","content":"done"}}"#).unwrap();
            file.flush().unwrap();
        }
        _ => {
            writeln!(file, r#"{{"type":"assistant","content":"ack: {prompt}"}}"#).unwrap();
            file.flush().unwrap();
        }
    }
}
