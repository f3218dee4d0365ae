//! Job supervision engine
//!
//! [`JobRegistry`] spawns and indexes [`Job`]s. Each job captures its output
//! into a [`LogBuffer`] and may be subject to a [`ResourceLimitGroup`] and a
//! [`UsageSampler`].

pub mod error;
pub mod job;
pub mod limits;
pub mod log_buffer;
pub mod registry;
pub mod usage;

pub use error::{JobError, Result};
pub use job::{Job, STOP_TIMEOUT};
pub use limits::{CgroupLimits, ResourceLimitGroup};
pub use log_buffer::LogBuffer;
pub use registry::JobRegistry;
pub use usage::{ResourceUsage, SysinfoSampler, UsageSampler};
