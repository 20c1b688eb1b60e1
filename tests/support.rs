// SPDX-License-Identifier: MIT

//! Shared black-box test harness: spins up a real `herdctld` against a
//! temporary config/state root and a fake provider CLI, and gives specs
//! a pre-wired `herdctl` command to drive it through.

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::time::{Duration, Instant};

/// Poll `condition` until it returns `true` or `max_ms` elapses.
pub fn wait_for(max_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return condition();
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

pub const SPEC_WAIT_MAX_MS: u64 = 5_000;

/// One agent's worth of config, written as `agents/<name>.toml`.
pub struct AgentSpec {
    pub name: String,
    pub toml_body: String,
}

impl AgentSpec {
    /// An agent with a single interval schedule driving the fake
    /// provider's default (successful) behavior.
    pub fn interval(name: &str, interval_secs: u64) -> Self {
        Self {
            name: name.to_string(),
            toml_body: format!(
                r#"
name = "{name}"
prompt = "do the thing"

[[schedules]]
name = "tick"
prompt_template = "ack"
kind = {{ kind = "interval", interval = {interval_secs} }}
"#
            ),
        }
    }

    /// An agent with no schedules, driven only by `herdctl trigger`.
    pub fn manual(name: &str) -> Self {
        Self { name: name.to_string(), toml_body: format!("name = \"{name}\"\nprompt = \"do the thing\"\n") }
    }

    pub fn with_max_concurrent(mut self, n: u32) -> Self {
        self.toml_body.push_str(&format!("max_concurrent = {n}\n"));
        self
    }
}

/// A running `herdctld` over a disposable config/state root, and the
/// `fake-agent` binary wired in as its provider CLI.
pub struct Fleet {
    _root: tempfile::TempDir,
    state_root: PathBuf,
    socket_path: PathBuf,
    config_dir: PathBuf,
    daemon: Child,
}

impl Fleet {
    /// Write `fleet.toml` + one file per agent, spawn `herdctld` against
    /// them, and block until its socket accepts connections.
    pub fn start(agents: &[AgentSpec]) -> Self {
        Self::start_with_behavior(agents, "success")
    }

    pub fn start_with_behavior(agents: &[AgentSpec], behavior: &str) -> Self {
        let root = tempfile::tempdir().expect("creating fleet tempdir");
        let config_dir = root.path().join("config");
        let state_root = root.path().join("state");
        let sessions_root = state_root.join("sessions");
        let socket_path = state_root.join("herdctl.sock");
        std::fs::create_dir_all(config_dir.join("agents")).unwrap();
        std::fs::create_dir_all(&sessions_root).unwrap();

        std::fs::write(
            config_dir.join("fleet.toml"),
            format!(
                "state_root = \"{}\"\ncheck_interval_secs = 1\nshutdown_timeout_secs = 5\n",
                state_root.display()
            ),
        )
        .unwrap();
        for agent in agents {
            std::fs::write(config_dir.join("agents").join(format!("{}.toml", agent.name)), &agent.toml_body).unwrap();
        }

        let daemon = std::process::Command::new(cargo_bin("herdctld"))
            .arg("--config-dir")
            .arg(&config_dir)
            .arg("--agent-binary")
            .arg(cargo_bin("fake-agent"))
            .arg("--log-text")
            .env("FAKE_AGENT_SESSIONS_ROOT", &sessions_root)
            .env("FAKE_AGENT_BEHAVIOR", behavior)
            .spawn()
            .expect("spawning herdctld");

        let fleet = Fleet { _root: root, state_root, socket_path, config_dir, daemon };
        assert!(wait_for(SPEC_WAIT_MAX_MS, || fleet.socket_path.exists()), "herdctld never created its socket");
        // The socket file can exist slightly before `listen` is ready to
        // accept; confirm with an actual status round-trip.
        assert!(wait_for(SPEC_WAIT_MAX_MS, || fleet.herdctl().arg("status").output().map(|o| o.status.success()).unwrap_or(false)), "herdctld never answered a status request");
        fleet
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    /// A `herdctl` invocation pre-wired to this fleet's socket.
    pub fn herdctl(&self) -> Command {
        let mut cmd = Command::cargo_bin("herdctl").expect("locating herdctl binary");
        cmd.arg("--socket").arg(&self.socket_path);
        cmd
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        let _ = self.daemon.kill();
        let _ = self.daemon.wait();
    }
}
