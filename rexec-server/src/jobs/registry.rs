//! Job registry
//!
//! Thread-safe index of the jobs a server is supervising. The map lock only
//! guards map access; spawning, waiting and log reads happen outside of it.

use rexec_core::domain::job::JobId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

use super::error::{JobError, Result};
use super::job::{Job, STOP_TIMEOUT};
use super::limits::ResourceLimitGroup;
use super::usage::UsageSampler;

pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Arc<Job>>>,
    limits: Option<Arc<dyn ResourceLimitGroup>>,
    sampler: Option<Arc<dyn UsageSampler>>,
}

impl JobRegistry {
    /// Creates an empty registry
    ///
    /// # Arguments
    /// * `limits` - Group every created process is attached to
    /// * `sampler` - Usage source handed to every created job
    pub fn new(
        limits: Option<Arc<dyn ResourceLimitGroup>>,
        sampler: Option<Arc<dyn UsageSampler>>,
    ) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            limits,
            sampler,
        }
    }

    /// Starts a new job and begins tracking it
    ///
    /// Nothing is registered when the process fails to start.
    pub fn create(&self, command: Vec<String>) -> Result<Arc<Job>> {
        let job = Job::spawn(command, self.limits.as_deref(), self.sampler.clone())
            .inspect_err(|e| warn!("Could not create a job: {}", e))?;

        self.jobs().insert(job.id(), Arc::clone(&job));
        Ok(job)
    }

    pub fn find(&self, id: &JobId) -> Option<Arc<Job>> {
        self.jobs().get(id).cloned()
    }

    /// Stops a job and stops tracking it
    ///
    /// # Returns
    /// The stopped job, whose final status stays readable. If stopping fails
    /// the job remains registered so the call can be retried.
    pub async fn stop(&self, id: &JobId) -> Result<Arc<Job>> {
        self.stop_within(id, STOP_TIMEOUT).await
    }

    /// Like [`JobRegistry::stop`], waiting at most `timeout` for the exit
    pub async fn stop_within(&self, id: &JobId, timeout: Duration) -> Result<Arc<Job>> {
        let job = self.find(id).ok_or(JobError::NotFound(*id))?;

        job.stop_within(timeout).await?;

        self.jobs().remove(id);
        Ok(job)
    }

    /// Snapshot of every tracked job, in no particular order
    pub fn list(&self) -> Vec<Arc<Job>> {
        self.jobs().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Kills every tracked process and releases the limit group
    ///
    /// Does not wait for the processes to exit and leaves them registered.
    /// Releasing the group may block while the kernel tears it down, so it
    /// runs on the blocking pool.
    pub async fn kill_all(&self) {
        let jobs = self.list();
        info!("Killing {} job(s)", jobs.len());

        for job in jobs {
            if let Err(e) = job.kill().await {
                error!("Failed to kill job {}: {}", job.id(), e);
            }
        }

        if let Some(limits) = self.limits.clone() {
            match tokio::task::spawn_blocking(move || limits.release()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Could not release resource limits: {:#}", e),
                Err(e) => error!("Releasing resource limits failed: {}", e),
            }
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, Arc<Job>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
