//! Error DTOs

use serde::{Deserialize, Serialize};

/// Body of every non-success API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
