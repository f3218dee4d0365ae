//! Log streaming DTOs
//!
//! Logs are delivered as a Server-Sent-Events stream. Every captured line is
//! sent as a [`LOG_EVENT`] whose id is the line's index and whose data is a
//! JSON encoded [`LogEntry`](crate::domain::log::LogEntry). The stream is
//! closed with a single [`END_EVENT`] once the job's output is exhausted.

use serde::{Deserialize, Serialize};

pub const LOG_EVENT: &str = "log";
pub const END_EVENT: &str = "end";

/// Query parameters of the log stream endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogQuery {
    /// Index of the first line to send
    #[serde(default)]
    pub offset: Option<usize>,
}
