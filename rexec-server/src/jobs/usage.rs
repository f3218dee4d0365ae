//! Process resource usage sampling

use anyhow::{Result, anyhow};
use std::sync::{Mutex, PoisonError};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// CPU and memory figures of a single process
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    /// CPU usage since the previous sample, 100.0 being one full core
    pub cpu_percent: f32,
    /// Resident memory in bytes
    pub memory_bytes: u64,
}

/// Source of per-process resource usage
pub trait UsageSampler: Send + Sync {
    /// Samples the current usage of the process with the given PID
    ///
    /// # Arguments
    /// * `pid` - Operating system process id
    ///
    /// # Returns
    /// The usage figures, or an error if the process cannot be inspected
    fn sample(&self, pid: u32) -> Result<ResourceUsage>;
}

/// Sampler backed by the `sysinfo` process table
///
/// CPU usage is computed against the previous refresh of the same process,
/// so the first sample of a process usually reports 0%.
pub struct SysinfoSampler {
    system: Mutex<System>,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageSampler for SysinfoSampler {
    fn sample(&self, pid: u32) -> Result<ResourceUsage> {
        let pid = Pid::from_u32(pid);
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);

        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = system
            .process(pid)
            .ok_or_else(|| anyhow!("process {} not found", pid))?;

        Ok(ResourceUsage {
            cpu_percent: process.cpu_usage(),
            memory_bytes: process.memory(),
        })
    }
}
