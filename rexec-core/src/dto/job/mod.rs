//! Job DTOs

use serde::{Deserialize, Serialize};

/// Request to start a new job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Program followed by its arguments
    pub command: Vec<String>,
}
