//! Job command handlers
//!
//! Handles starting, stopping and inspecting remote jobs, and following
//! their output.

use anyhow::{Context, Result};
use chrono::Local;
use colored::*;
use futures::StreamExt;
use rexec_client::RexecClient;
use rexec_core::domain::job::{JobDetails, JobStatus};
use rexec_core::domain::log::{LogEntry, LogSource};
use std::io::{self, Write};

use crate::id_resolver::resolve_job_id;
use crate::types::IdOrPrefix;

const SEPARATOR: &str = "------------------------------------------------------------";

/// Start a job and show its id
pub async fn start_job(client: &RexecClient, command: Vec<String>) -> Result<()> {
    println!("Starting command: {}", command.join(" "));

    let status = client
        .start_job(command)
        .await
        .context("Could not start a new command")?;

    println!("{} {}", "Started job".green(), status.id.to_string().cyan());
    Ok(())
}

/// Stop a job and show its final status
pub async fn stop_job(client: &RexecClient, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, &IdOrPrefix::parse(id)).await?;
    println!("Stopping job {}", job_id);

    let status = client.stop_job(job_id).await.map_err(|e| {
        if e.is_timeout() {
            anyhow::anyhow!("Job {} did not exit in time, try stopping it again", job_id)
        } else {
            anyhow::Error::new(e).context("Could not stop the job")
        }
    })?;

    println!("{}", "Stopped job".green());
    print_status(&mut io::stdout().lock(), &status)?;
    Ok(())
}

/// List all jobs, separated by rules
pub async fn list_jobs(client: &RexecClient) -> Result<()> {
    let jobs = client.list_jobs().await.context("Could not list jobs")?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} job(s):", jobs.len()).bold());
    let mut out = io::stdout().lock();
    for status in &jobs {
        writeln!(out, "{}", SEPARATOR.dimmed())?;
        print_status(&mut out, status)?;
    }
    Ok(())
}

/// Show the status of one job
pub async fn show_status(client: &RexecClient, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, &IdOrPrefix::parse(id)).await?;

    let status = client
        .get_status(job_id)
        .await
        .context("Could not get status for the job")?;

    print_status(&mut io::stdout().lock(), &status)?;
    Ok(())
}

/// Follow the output of a job until the server reports its end
pub async fn stream_logs(client: &RexecClient, id: &str, offset: usize) -> Result<()> {
    let job_id = resolve_job_id(client, &IdOrPrefix::parse(id)).await?;
    println!("Showing logs for job {}", job_id);

    let mut logs = client
        .stream_logs(job_id, offset)
        .await
        .context("Could not get logs for the job")?;

    while let Some(entry) = logs.next().await {
        let entry = entry.context("Could not receive logs")?;
        print_log_entry(&entry);
    }

    println!("{}", "== End of logs ==".bold());
    Ok(())
}

/// Write a job status as aligned `label: value` lines
fn print_status(out: &mut impl Write, status: &JobStatus) -> io::Result<()> {
    writeln!(out, "Job ID : {}", status.id)?;
    writeln!(out, "Command: {}", status.command.join(" "))?;
    writeln!(
        out,
        "Started: {}",
        status.started.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "Logs   : {}", status.logs)?;

    match &status.details {
        JobDetails::Stopped(stopped) => {
            writeln!(
                out,
                "Stopped: {}",
                stopped.stopped.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            )?;
            writeln!(out, "E. code: {}", stopped.exit_code)?;
        }
        JobDetails::Pending(pending) => {
            match pending.cpu_percent {
                Some(cpu) => writeln!(out, "CPU %  : {:.2}", cpu)?,
                None => writeln!(out, "CPU %  : n/a")?,
            }
            match pending.memory_bytes {
                Some(memory) => writeln!(out, "Memory : {}", memory)?,
                None => writeln!(out, "Memory : n/a")?,
            }
        }
    }
    Ok(())
}

/// Print a log line: stdout lines in green on stdout, stderr lines in red on stderr
fn print_log_entry(entry: &LogEntry) {
    let timestamp = entry
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    match entry.source {
        LogSource::Stdout => println!("{}: {}", timestamp.cyan(), entry.text.green()),
        LogSource::Stderr => eprintln!("{}: {}", timestamp.cyan(), entry.text.red()),
    }
}
