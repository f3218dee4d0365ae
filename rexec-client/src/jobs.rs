//! Job-related API endpoints

use crate::RexecClient;
use crate::error::Result;
use reqwest::Method;
use rexec_core::domain::job::{JobId, JobStatus};
use rexec_core::dto::job::CreateJob;

impl RexecClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Start a new job on the server
    ///
    /// # Arguments
    /// * `command` - Program followed by its arguments
    ///
    /// # Returns
    /// The status of the freshly started job
    pub async fn start_job(&self, command: Vec<String>) -> Result<JobStatus> {
        let response = self
            .unary(Method::POST, "/api/jobs")
            .json(&CreateJob { command })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Stop a job and stop tracking it on the server
    ///
    /// # Arguments
    /// * `job_id` - The job to stop
    ///
    /// # Returns
    /// The final status of the job
    pub async fn stop_job(&self, job_id: JobId) -> Result<JobStatus> {
        let path = format!("/api/jobs/{}/stop", job_id);
        let response = self.unary(Method::POST, &path).send().await?;

        self.handle_response(response).await
    }

    /// Get a status snapshot of a job
    ///
    /// # Arguments
    /// * `job_id` - The job to inspect
    pub async fn get_status(&self, job_id: JobId) -> Result<JobStatus> {
        let path = format!("/api/jobs/{}", job_id);
        let response = self.unary(Method::GET, &path).send().await?;

        self.handle_response(response).await
    }

    /// List all jobs tracked by the server, oldest first
    pub async fn list_jobs(&self) -> Result<Vec<JobStatus>> {
        let response = self.unary(Method::GET, "/api/jobs").send().await?;

        self.handle_response(response).await
    }

    /// Check that the server is up
    pub async fn health(&self) -> Result<()> {
        let response = self.unary(Method::GET, "/health").send().await?;
        self.check_status(response).await?;
        Ok(())
    }
}
