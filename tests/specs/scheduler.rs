//! Scheduler specs (spec.md §4.8, §8 scenarios 1-2): interval dispatch,
//! rescheduling, and the per-agent concurrency cap.

use crate::prelude::*;

fn jobs_json(fleet: &Fleet, agent: &str) -> Vec<Value> {
    let output = fleet.herdctl().arg("--output").arg("json").arg("jobs").arg("--agent").arg(agent).output().unwrap();
    assert!(output.status.success(), "herdctl jobs failed: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("parsing jobs json")
}

fn completed_jobs(fleet: &Fleet, agent: &str) -> Vec<Value> {
    jobs_json(fleet, agent).into_iter().filter(|j| j["status"] == "completed" || j["status"] == "failed").collect()
}

/// Scenario 1: an interval schedule fires repeatedly, each run completes
/// successfully, and `next_run_at` keeps advancing.
#[test]
#[serial]
fn interval_schedule_fires_completes_and_reschedules() {
    let fleet = Fleet::start(&[AgentSpec::interval("alpha", 1)]);

    assert!(
        wait_for(SPEC_WAIT_MAX_MS, || completed_jobs(&fleet, "alpha").len() >= 2),
        "expected at least 2 completed jobs for alpha within {SPEC_WAIT_MAX_MS}ms"
    );

    for job in completed_jobs(&fleet, "alpha") {
        assert_eq!(job["status"], "completed");
        assert_eq!(job["exit_reason"], "success");
    }

    let status = fleet.herdctl().arg("--output").arg("json").arg("status").arg("alpha").output().unwrap();
    assert!(status.status.success());
    let view: Value = serde_json::from_slice(&status.stdout).unwrap();
    let schedule = &view["schedules"][0];
    assert_eq!(schedule["name"], "tick");
    assert!(schedule["next_run_at"].is_string(), "next_run_at should be scheduled: {view}");
}

/// Scenario 2: with `max_concurrent = 1` (the default) and a runtime
/// that blocks forever, at no sampled instant are two jobs for the same
/// agent running at once.
#[test]
#[serial]
fn concurrency_cap_is_never_exceeded() {
    let fleet = Fleet::start_with_behavior(&[AgentSpec::interval("busy", 1)], "hang");

    let mut saw_running = false;
    for _ in 0..40 {
        let status = fleet.herdctl().arg("--output").arg("json").arg("status").arg("busy").output().unwrap();
        if status.status.success() {
            let view: Value = serde_json::from_slice(&status.stdout).unwrap();
            let running = view["running_job_count"].as_u64().unwrap_or(0);
            assert!(running <= 1, "observed {running} concurrently running jobs for max_concurrent=1");
            if running == 1 {
                saw_running = true;
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    assert!(saw_running, "expected to observe at least one running job for the hanging agent");
}
