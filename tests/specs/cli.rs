//! Operator CLI specs (spec.md §4.9, §6, §8 scenario 6): the `cancel`
//! command's exit-code contract and the escalation it drives.

use crate::prelude::*;

/// A job whose runtime ignores graceful termination (it never checks
/// its cancellation token) is still killed and reaches a terminal
/// `cancelled` state once `cancel` signals it.
#[test]
#[serial]
fn cancel_of_hanging_job_reaches_a_terminal_state() {
    let fleet = Fleet::start_with_behavior(&[AgentSpec::manual("epsilon")], "hang");

    // Fire-and-forget trigger: --wait would never return, since the
    // fake agent hangs forever once started.
    let trigger = fleet.herdctl().arg("trigger").arg("epsilon").output().unwrap();
    assert!(trigger.status.success());
    let job_id = String::from_utf8_lossy(&trigger.stdout).split_whitespace().next().unwrap().to_string();

    assert!(job_reaches_status(&fleet, &job_id, "running"), "job never reached running status");

    let cancel = fleet.herdctl().arg("cancel").arg(&job_id).arg("--timeout-secs").arg("1").output().unwrap();
    assert!(
        cancel.status.success(),
        "cancel should exit 0 once the cancel reaches a terminal state: {}",
        String::from_utf8_lossy(&cancel.stdout)
    );

    assert!(job_reaches_status(&fleet, &job_id, "cancelled"), "job never reached cancelled status after cancel");
}

fn job_reaches_status(fleet: &Fleet, job_id: &str, status: &str) -> bool {
    wait_for(SPEC_WAIT_MAX_MS, || {
        let detail = fleet.herdctl().arg("--output").arg("json").arg("job").arg(job_id).output().unwrap();
        detail.status.success() && {
            let view: Value = serde_json::from_slice(&detail.stdout).unwrap();
            view["status"] == status
        }
    })
}
