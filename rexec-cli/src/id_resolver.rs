//! ID resolver module
//!
//! Handles resolution of job id prefixes to full ids by querying the API.
//! This allows users to specify short, unambiguous prefixes instead of full UUIDs.

use anyhow::{Context, Result, anyhow};
use rexec_client::RexecClient;
use rexec_core::domain::job::JobId;

use crate::types::IdOrPrefix;

/// Resolve a job ID or prefix to a full job id
///
/// If the input is already a full id, returns it immediately.
/// Otherwise, fetches all jobs and finds the one matching the prefix.
///
/// # Arguments
/// * `client` - The API client to use for fetching jobs
/// * `id_or_prefix` - The ID or prefix to resolve
///
/// # Errors
/// Returns an error if:
/// - No job matches the prefix
/// - Multiple jobs match the prefix (ambiguous)
/// - API call fails
pub async fn resolve_job_id(client: &RexecClient, id_or_prefix: &IdOrPrefix) -> Result<JobId> {
    // If it's already a full id, return it
    if let Some(id) = id_or_prefix.as_id() {
        return Ok(id);
    }

    let jobs = client
        .list_jobs()
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    match_prefix(jobs.iter().map(|job| job.id), &id_or_prefix.as_str())
}

/// Picks the single id starting with `prefix`, case-insensitively
fn match_prefix(ids: impl IntoIterator<Item = JobId>, prefix: &str) -> Result<JobId> {
    let prefix = prefix.to_lowercase();
    let matches: Vec<JobId> = ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
