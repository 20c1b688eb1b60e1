//! Job Executor specs (spec.md §4.6, §8 scenario 4 and the job-id/
//! message-log wire-format properties).

use crate::prelude::*;

fn trigger_and_wait(fleet: &Fleet, agent: &str) -> String {
    let output = fleet.herdctl().arg("trigger").arg(agent).arg("--wait").output().unwrap();
    assert!(output.status.success(), "trigger --wait failed: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8_lossy(&output.stdout).split_whitespace().next().expect("job id in trigger output").to_string()
}

/// Scenario 4: malformed messages interleaved with well-formed ones are
/// all tolerated — the job completes, and each still reaches the log.
#[test]
#[serial]
fn malformed_messages_are_tolerated() {
    let fleet = Fleet::start_with_behavior(&[AgentSpec::manual("gamma")], "malformed");
    let job_id = trigger_and_wait(&fleet, "gamma");

    let logs = fleet.herdctl().arg("logs").arg(&job_id).output().unwrap();
    assert!(logs.status.success());
    let stdout = String::from_utf8_lossy(&logs.stdout).into_owned();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 5, "expected 5 message log lines, got: {lines:?}");

    let parsed: Vec<Value> = lines.iter().map(|l| serde_json::from_str(l).expect("each log line is JSON")).collect();
    assert_eq!(parsed[0]["type"], "system");
    assert_eq!(parsed[0]["subtype"], "init");
    assert_eq!(parsed[1]["type"], "system");
    assert_eq!(parsed[1]["subtype"], "malformed_message");
    assert_eq!(parsed[2]["type"], "system");
    assert_eq!(parsed[2]["subtype"], "unknown_type");
    assert_eq!(parsed[3]["type"], "system");
    assert_eq!(parsed[3]["subtype"], "unknown_type");
    assert_eq!(parsed[4]["type"], "assistant");
}

/// A manual trigger produces a well-formed job id, a completed job
/// record with a session id, and shows up in the agent's job list.
#[test]
#[serial]
fn manual_trigger_and_job_detail_round_trip() {
    let fleet = Fleet::start(&[AgentSpec::manual("delta")]);
    let job_id = trigger_and_wait(&fleet, "delta");
    assert!(job_id_matches_wire_format(&job_id), "job id {job_id} does not match ^job-\\d{{4}}-\\d{{2}}-\\d{{2}}-[a-z0-9]+$");

    let detail = fleet.herdctl().arg("--output").arg("json").arg("job").arg(&job_id).output().unwrap();
    assert!(detail.status.success());
    let view: Value = serde_json::from_slice(&detail.stdout).unwrap();
    assert_eq!(view["job_id"], job_id);
    assert_eq!(view["agent"], "delta");
    assert_eq!(view["status"], "completed");
    assert_eq!(view["exit_reason"], "success");
    assert!(view["session_id"].is_string());

    let jobs = fleet.herdctl().arg("--output").arg("json").arg("jobs").arg("--agent").arg("delta").output().unwrap();
    let jobs: Vec<Value> = serde_json::from_slice(&jobs.stdout).unwrap();
    assert!(jobs.iter().any(|j| j["job_id"] == job_id));
}

fn job_id_matches_wire_format(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("job-") else { return false };
    let parts: Vec<&str> = rest.splitn(4, '-').collect();
    parts.len() == 4
        && parts[0].len() == 4
        && parts[1].len() == 2
        && parts[2].len() == 2
        && parts[0..3].iter().all(|p| p.chars().all(|c| c.is_ascii_digit()))
        && !parts[3].is_empty()
        && parts[3].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
