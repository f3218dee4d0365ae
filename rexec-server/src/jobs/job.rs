//! Job supervision
//!
//! A [`Job`] owns one OS process from spawn to exit:
//! - Captures stdout and stderr into a [`LogBuffer`]
//! - Runs a monitor task that records the exit exactly once
//! - Exposes status snapshots and kill/stop
//!
//! The monitor task is the only owner of the child handle. Kill requests are
//! sent to it over a channel, so a signal is never delivered to a PID the
//! monitor has already reaped.

use chrono::{DateTime, Utc};
use rexec_core::domain::job::{JobDetails, JobId, JobStatus, PendingDetails, StoppedDetails};
use rexec_core::domain::log::LogEntry;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

use super::error::{JobError, Result};
use super::limits::ResourceLimitGroup;
use super::log_buffer::LogBuffer;
use super::usage::UsageSampler;

/// How long [`Job::stop`] waits for the process to exit after killing it
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

type StopState = Arc<Mutex<Option<StoppedDetails>>>;
type KillReply = oneshot::Sender<io::Result<()>>;

/// One supervised process with its captured output
pub struct Job {
    id: JobId,
    command: Vec<String>,
    started: DateTime<Utc>,
    pid: u32,
    logs: Arc<LogBuffer>,
    /// `None` while pending; written once by the monitor task
    stopped: StopState,
    sampler: Option<Arc<dyn UsageSampler>>,
    kill_tx: mpsc::UnboundedSender<KillReply>,
    exited: watch::Receiver<bool>,
}

impl Job {
    /// Spawns `command` and starts supervising it
    ///
    /// # Arguments
    /// * `command` - Program followed by its arguments
    /// * `limits` - Group the process is moved into right after spawning
    /// * `sampler` - Source of the CPU and memory figures in status snapshots
    ///
    /// # Returns
    /// The running job, or `StartFailed` if the process could not be set up.
    /// A process that was spawned but failed a later setup step is killed.
    pub fn spawn(
        command: Vec<String>,
        limits: Option<&dyn ResourceLimitGroup>,
        sampler: Option<Arc<dyn UsageSampler>>,
    ) -> Result<Arc<Job>> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| JobError::StartFailed("command is empty".to_string()))?;

        // Taken before spawning so the monitor can never record an earlier exit.
        let started = Utc::now();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| JobError::StartFailed(format!("{}: {}", program, e)))?;

        let Some(pid) = child.id() else {
            return Err(abort(child, "process exited before it could be tracked"));
        };

        if let Some(limits) = limits {
            if let Err(e) = limits.attach(pid) {
                return Err(abort(
                    child,
                    format!("could not apply resource limits: {:#}", e),
                ));
            }
        }

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(abort(child, "output pipes are missing"));
        };

        let id = JobId::new();
        let logs = LogBuffer::from_pipes(id, stdout, stderr);
        let stopped: StopState = Arc::new(Mutex::new(None));
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let (exited_tx, exited) = watch::channel(false);

        tokio::spawn(monitor(id, child, Arc::clone(&stopped), kill_rx, exited_tx));

        info!("Started job {} (pid {}): {}", id, pid, command.join(" "));

        Ok(Arc::new(Job {
            id,
            command,
            started,
            pid,
            logs,
            stopped,
            sampler,
            kill_tx,
            exited,
        }))
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn logs(&self) -> &Arc<LogBuffer> {
        &self.logs
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_state().is_some()
    }

    /// Takes a snapshot of the job
    ///
    /// Usage is sampled while the state lock is held, so a pending snapshot
    /// never describes a process the monitor has already recorded as exited.
    pub fn status(&self) -> JobStatus {
        let details = {
            let stopped = self.stopped_state();
            match stopped.as_ref() {
                Some(stopped) => JobDetails::Stopped(stopped.clone()),
                None => JobDetails::Pending(self.sample_usage()),
            }
        };

        JobStatus {
            id: self.id,
            command: self.command.clone(),
            started: self.started,
            logs: self.logs.size(),
            details,
        }
    }

    fn sample_usage(&self) -> PendingDetails {
        let Some(sampler) = &self.sampler else {
            return PendingDetails::default();
        };

        match sampler.sample(self.pid) {
            Ok(usage) => PendingDetails {
                cpu_percent: Some(usage.cpu_percent),
                memory_bytes: Some(usage.memory_bytes),
            },
            Err(e) => {
                warn!("Could not sample usage of job {}: {:#}", self.id, e);
                PendingDetails::default()
            }
        }
    }

    /// Reads captured output, waiting for more while the process may still write
    ///
    /// See [`LogBuffer::get`].
    pub async fn get_logs(&self, start: usize, max_count: usize) -> Vec<LogEntry> {
        self.logs.get(start, max_count).await
    }

    /// Sends SIGKILL to the process without waiting for it to exit
    ///
    /// Succeeds without doing anything once the job is stopped.
    pub async fn kill(&self) -> Result<()> {
        if self.is_stopped() {
            return Ok(());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if self.kill_tx.send(reply_tx).is_err() {
            // Monitor is gone, the process has been reaped.
            return Ok(());
        }

        match reply_rx.await {
            Ok(Ok(())) => {
                info!("Sent kill signal to job {}", self.id);
                Ok(())
            }
            Ok(Err(e)) => Err(JobError::Internal(format!(
                "failed to kill job {}: {}",
                self.id, e
            ))),
            Err(_) => Ok(()),
        }
    }

    /// Waits until the monitor has recorded the exit
    pub async fn wait(&self) {
        let mut exited = self.exited.clone();
        // An error means the monitor is gone, which it only is after exiting.
        let _ = exited.wait_for(|done| *done).await;
    }

    /// Kills the process and waits up to [`STOP_TIMEOUT`] for it to exit
    ///
    /// On timeout the job is left pending and the call can be retried.
    pub async fn stop(&self) -> Result<()> {
        self.stop_within(STOP_TIMEOUT).await
    }

    /// Like [`Job::stop`], waiting at most `timeout` for the exit
    pub async fn stop_within(&self, timeout: Duration) -> Result<()> {
        self.kill().await?;

        if tokio::time::timeout(timeout, self.wait()).await.is_err() {
            warn!("Job {} did not exit within {:?}", self.id, timeout);
            return Err(JobError::Timeout(self.id));
        }

        if !self.is_stopped() {
            return Err(JobError::Internal(format!(
                "monitor of job {} ended without recording an exit",
                self.id
            )));
        }

        info!("Stopped job {}", self.id);
        Ok(())
    }

    fn stopped_state(&self) -> MutexGuard<'_, Option<StoppedDetails>> {
        self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Kills a half set up child and turns `reason` into a start failure
fn abort(mut child: Child, reason: impl Into<String>) -> JobError {
    if let Err(e) = child.start_kill() {
        warn!("Could not kill abandoned process: {}", e);
    }
    drop(child);
    JobError::StartFailed(reason.into())
}

async fn monitor(
    id: JobId,
    mut child: Child,
    stopped: StopState,
    mut kill_rx: mpsc::UnboundedReceiver<KillReply>,
    exited_tx: watch::Sender<bool>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(reply) = kill_rx.recv() => {
                let _ = reply.send(child.start_kill());
            }
        }
    };

    let exit_code = match status {
        Ok(status) => exit_code(status),
        Err(e) => {
            warn!("Failed to wait for job {}: {}", id, e);
            -1
        }
    };

    {
        let mut stopped = stopped.lock().unwrap_or_else(PoisonError::into_inner);
        if stopped.is_none() {
            *stopped = Some(StoppedDetails {
                stopped: Utc::now(),
                exit_code,
            });
        }
    }

    info!("Job {} exited with code {}", id, exit_code);
    exited_tx.send_replace(true);
}

/// Exit status code, or the negated signal number for killed processes
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}
