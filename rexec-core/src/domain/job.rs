//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of a job
///
/// Generated by the server when the job is created and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time snapshot of a job
///
/// Produced by the server on every status query. The `details` field tells
/// whether the process is still running or has already exited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub command: Vec<String>,
    pub started: DateTime<Utc>,
    /// Number of log lines captured so far
    pub logs: usize,
    pub details: JobDetails,
}

impl JobStatus {
    pub fn is_stopped(&self) -> bool {
        matches!(self.details, JobDetails::Stopped(_))
    }

    /// Exit code of the process, if it has exited
    pub fn exit_code(&self) -> Option<i32> {
        match &self.details {
            JobDetails::Stopped(stopped) => Some(stopped.exit_code),
            JobDetails::Pending(_) => None,
        }
    }
}

/// Lifecycle phase of a job together with the data specific to that phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobDetails {
    /// The process is still running
    Pending(PendingDetails),
    /// The process has exited
    Stopped(StoppedDetails),
}

/// Resource usage of a running process
///
/// Both fields are absent when usage sampling is disabled or failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingDetails {
    pub cpu_percent: Option<f32>,
    pub memory_bytes: Option<u64>,
}

/// Terminal state of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppedDetails {
    pub stopped: DateTime<Utc>,
    /// Exit code of the process; negated signal number when killed by a signal
    pub exit_code: i32,
}
