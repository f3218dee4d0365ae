//! Job API Handlers
//!
//! HTTP endpoints for starting, inspecting and stopping jobs, and for
//! streaming their output.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use rexec_core::domain::job::{JobId, JobStatus};
use rexec_core::dto::job::CreateJob;
use rexec_core::dto::log::{END_EVENT, LOG_EVENT, LogQuery};
use std::convert::Infallible;
use std::sync::Arc;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::jobs::Job;

/// Number of lines taken from a log buffer per read
const LOG_BATCH_SIZE: usize = 10;

/// Ids that do not parse cannot belong to any job
fn parse_id(id: &str) -> ApiResult<JobId> {
    id.parse()
        .map_err(|_| ApiError::NotFound(format!("job {} was not found", id)))
}

fn find_job(state: &AppState, id: &str) -> ApiResult<Arc<Job>> {
    let job_id = parse_id(id)?;
    state
        .registry
        .find(&job_id)
        .ok_or_else(|| ApiError::NotFound(format!("job {} was not found", job_id)))
}

/// POST /api/jobs
/// Start a new job
pub async fn start_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJob>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<JobStatus>)> {
    let Json(req) = payload?;
    tracing::info!("Starting command {:?}", req.command);

    let job = state.registry.create(req.command)?;

    Ok((StatusCode::CREATED, Json(job.status())))
}

/// GET /api/jobs
/// List all tracked jobs, oldest first
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<JobStatus>>> {
    tracing::debug!("Listing jobs");

    let mut statuses: Vec<JobStatus> = state
        .registry
        .list()
        .iter()
        .map(|job| job.status())
        .collect();
    statuses.sort_by_key(|status| status.started);

    Ok(Json(statuses))
}

/// GET /api/jobs/{id}
/// Get a status snapshot of a job
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatus>> {
    tracing::debug!("Showing status for job {}", id);

    let job = find_job(&state, &id)?;

    Ok(Json(job.status()))
}

/// POST /api/jobs/{id}/stop
/// Kill a job, wait for it to exit and stop tracking it
pub async fn stop_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatus>> {
    tracing::info!("Stopping job {}", id);

    let job_id = parse_id(&id)?;
    let job = state.registry.stop(&job_id).await?;

    Ok(Json(job.status()))
}

/// GET /api/jobs/{id}/logs?offset=N
/// Stream the output of a job as Server-Sent Events
///
/// Replays everything from `offset`, follows new lines while the process
/// writes, then sends an `end` event once the output is exhausted.
pub async fn stream_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let job = find_job(&state, &id)?;
    let mut position = query.offset.unwrap_or(0);

    tracing::info!("Showing logs for job {} from line {}", job.id(), position);

    let stream = async_stream::stream! {
        loop {
            let batch = job.get_logs(position, LOG_BATCH_SIZE).await;
            if batch.is_empty() {
                break;
            }

            for entry in batch {
                let event = Event::default()
                    .event(LOG_EVENT)
                    .id(position.to_string())
                    .data(serde_json::to_string(&entry).unwrap_or_default());
                position += 1;
                yield Ok(event);
            }
        }

        tracing::debug!("Log stream of job {} ended at line {}", job.id(), position);
        yield Ok(Event::default().event(END_EVENT).data("{}"));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
