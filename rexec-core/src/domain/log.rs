//! Log domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of output captured from a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub text: String,
    pub source: LogSource,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Creates an entry stamped with the current time
    pub fn new(text: impl Into<String>, source: LogSource) -> Self {
        Self {
            text: text.into(),
            source,
            timestamp: Utc::now(),
        }
    }
}

/// Output stream a log line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSource::Stdout => write!(f, "stdout"),
            LogSource::Stderr => write!(f, "stderr"),
        }
    }
}
