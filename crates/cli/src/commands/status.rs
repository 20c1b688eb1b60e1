// SPDX-License-Identifier: MIT

//! `herdctl status [agent]` (spec.md §4.9, §6).

use crate::client::Connection;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, handle_list, OutputFormat};
use crate::{color, EXIT_OK};
use herdctl_wire::{AgentStatusSummary, FleetStatusView, Request, Response};

/// `herdctl agents`: one line per configured agent, no schedule detail.
pub async fn agents(conn: &mut Connection, format: OutputFormat) -> Result<i32, ExitError> {
    let response = conn.roundtrip(&Request::Status).await?;
    let Response::Status(view) = response else {
        return Err(ExitError::generic("unexpected response to status request"));
    };
    handle_list(format, &view.agents, "No agents configured", |agents| {
        for agent in agents {
            let last = agent.last_job_status.as_deref().unwrap_or("-");
            println!(
                "{:<20} running={:<3} last={}",
                color::header(&agent.agent),
                agent.running_job_count,
                color::status(last)
            );
        }
    })
    .map_err(|e| ExitError::generic(e.to_string()))?;
    Ok(EXIT_OK)
}

pub async fn run(conn: &mut Connection, agent: Option<String>, format: OutputFormat) -> Result<i32, ExitError> {
    match agent {
        None => {
            let response = conn.roundtrip(&Request::Status).await?;
            let Response::Status(view) = response else {
                return Err(ExitError::generic("unexpected response to status request"));
            };
            format_or_json(format, &view, || print_fleet_status(&view)).map_err(|e| ExitError::generic(e.to_string()))?;
        }
        Some(agent) => {
            let response = conn.roundtrip(&Request::AgentStatus { agent }).await?;
            let Response::AgentStatus(summary) = response else {
                return Err(ExitError::generic("unexpected response to agent-status request"));
            };
            format_or_json(format, &summary, || print_agent_status(&summary)).map_err(|e| ExitError::generic(e.to_string()))?;
        }
    }
    Ok(EXIT_OK)
}

fn print_fleet_status(view: &FleetStatusView) {
    println!("{} since {}", color::header("herdctld"), view.started_at.to_rfc3339());
    for agent in &view.agents {
        print_agent_status(agent);
    }
}

fn print_agent_status(summary: &AgentStatusSummary) {
    let last = summary.last_job_status.as_deref().unwrap_or("-");
    println!(
        "{:<20} running={:<3} last={}",
        color::header(&summary.agent),
        summary.running_job_count,
        color::status(last)
    );
    for schedule in &summary.schedules {
        let next = schedule.next_run_at.map(|at| at.to_rfc3339()).unwrap_or_else(|| "-".to_string());
        print!("  {:<16} {:<10} next={}", schedule.name, color::status(&schedule.status), color::muted(&next));
        if let Some(err) = &schedule.last_error {
            print!(" error={}", color::muted(err));
        }
        println!();
    }
}
