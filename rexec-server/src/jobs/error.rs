//! Job engine errors

use rexec_core::domain::job::JobId;
use thiserror::Error;

/// Result type alias for job operations
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors returned by [`Job`](super::Job) and [`JobRegistry`](super::JobRegistry)
#[derive(Debug, Error)]
pub enum JobError {
    /// The process could not be spawned or set up; nothing was registered
    #[error("could not start the process: {0}")]
    StartFailed(String),

    /// No job with this id is tracked
    #[error("job {0} was not found")]
    NotFound(JobId),

    /// The process did not exit within the stop timeout
    #[error("timed out waiting for job {0} to stop")]
    Timeout(JobId),

    /// The OS refused an operation on the process
    #[error("internal error: {0}")]
    Internal(String),
}

impl JobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
