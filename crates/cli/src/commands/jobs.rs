// SPDX-License-Identifier: MIT

//! `herdctl jobs` and `herdctl job <id>` (spec.md §4.9, §6).

use crate::client::Connection;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, format_time_ago, handle_list, OutputFormat};
use crate::{color, EXIT_OK};
use herdctl_wire::{JobDetailView, JobSummary, Request, Response};

pub async fn list(
    conn: &mut Connection,
    agent: Option<String>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<i32, ExitError> {
    let response = conn.roundtrip(&Request::JobList { agent, limit }).await?;
    let Response::Jobs(jobs) = response else {
        return Err(ExitError::generic("unexpected response to job-list request"));
    };
    handle_list(format, &jobs, "No jobs found", print_job_table).map_err(|e| ExitError::generic(e.to_string()))?;
    Ok(EXIT_OK)
}

pub async fn show(conn: &mut Connection, job_id: String, format: OutputFormat) -> Result<i32, ExitError> {
    let response = conn.roundtrip(&Request::JobDetail { job_id }).await?;
    let Response::Job(detail) = response else {
        return Err(ExitError::generic("unexpected response to job-detail request"));
    };
    format_or_json(format, &detail, || print_job_detail(&detail)).map_err(|e| ExitError::generic(e.to_string()))?;
    Ok(EXIT_OK)
}

fn print_job_table(jobs: &[JobSummary]) {
    for job in jobs {
        let started = job.started_at.map(format_time_ago).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<28} {:<12} {:<10} {:<9} {}",
            job.job_id,
            color::header(&job.agent),
            color::status(&job.status),
            job.exit_reason.as_deref().unwrap_or("-"),
            color::muted(&started)
        );
    }
}

fn print_job_detail(detail: &JobDetailView) {
    let summary = &detail.summary;
    println!("{}: {}", color::header("job"), summary.job_id);
    println!("  agent:     {}", summary.agent);
    println!("  schedule:  {}", summary.schedule_name.as_deref().unwrap_or("-"));
    println!("  trigger:   {}", summary.trigger_type);
    println!("  status:    {}", color::status(&summary.status));
    println!("  exit:      {}", summary.exit_reason.as_deref().unwrap_or("-"));
    println!("  session:   {}", detail.session_id.as_deref().unwrap_or("-"));
    println!("  prompt:    {}", detail.prompt);
    if let Some(text) = &detail.summary_text {
        println!("  summary:   {text}");
    }
}
