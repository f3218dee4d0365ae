//! API Module
//!
//! HTTP API layer of the server.
//! Each submodule handles endpoints for a specific concern.

pub mod auth;
pub mod error;
pub mod health;
pub mod job;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::jobs::JobRegistry;

/// Shared state of all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    /// Bearer token required on `/api` routes, if any
    pub token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(registry: Arc<JobRegistry>, token: Option<String>) -> Self {
        Self {
            registry,
            token: token.map(Arc::from),
        }
    }
}

/// Create the main router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/jobs", post(job::start_job).get(job::list_jobs))
        .route("/jobs/{id}", get(job::get_job))
        .route("/jobs/{id}/stop", post(job::stop_job))
        .route("/jobs/{id}/logs", get(job::stream_logs))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .nest("/api", api)
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use rexec_core::domain::job::{JobId, JobStatus};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const TOKEN: &str = "s3cret";

    fn app(registry: &Arc<JobRegistry>) -> Router {
        create_router(AppState::new(
            Arc::clone(registry),
            Some(TOKEN.to_string()),
        ))
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN));
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.oneshot(request).await.expect("request");
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        (status, body.to_vec())
    }

    async fn start(registry: &Arc<JobRegistry>, command: &[&str]) -> JobStatus {
        let (status, body) = send(
            app(registry),
            request("POST", "/api/jobs", Some(json!({ "command": command }))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_slice(&body).expect("job status")
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let registry = Arc::new(JobRegistry::new(None, None));
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app(&registry), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_missing_or_wrong_token_is_rejected() {
        let registry = Arc::new(JobRegistry::new(None, None));

        let anonymous = Request::builder()
            .uri("/api/jobs")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(&registry), anonymous).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"].is_string());

        let wrong = Request::builder()
            .uri("/api/jobs")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app(&registry), wrong).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_no_token_configured_allows_anyone() {
        let registry = Arc::new(JobRegistry::new(None, None));
        let app = create_router(AppState::new(Arc::clone(&registry), None));
        let request = Request::builder()
            .uri("/api/jobs")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"[]");
    }

    #[tokio::test]
    async fn test_start_status_and_list() {
        let registry = Arc::new(JobRegistry::new(None, None));
        let started = start(&registry, &["sleep", "10"]).await;
        assert!(!started.is_stopped());
        assert_eq!(started.command, vec!["sleep", "10"]);

        let (status, body) = send(
            app(&registry),
            request("GET", &format!("/api/jobs/{}", started.id), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let fetched: JobStatus = serde_json::from_slice(&body).unwrap();
        assert_eq!(fetched.id, started.id);

        let (status, body) = send(app(&registry), request("GET", "/api/jobs", None)).await;
        assert_eq!(status, StatusCode::OK);
        let listed: Vec<JobStatus> = serde_json::from_slice(&body).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, started.id);

        registry.kill_all().await;
    }

    #[tokio::test]
    async fn test_start_rejects_bad_commands() {
        let registry = Arc::new(JobRegistry::new(None, None));

        for command in [json!([]), json!(["/definitely/not/a/binary"])] {
            let (status, body) = send(
                app(&registry),
                request("POST", "/api/jobs", Some(json!({ "command": command }))),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let body: Value = serde_json::from_slice(&body).unwrap();
            assert!(body["error"].as_str().unwrap().contains("could not start"));
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_gets_error_json() {
        let registry = Arc::new(JobRegistry::new(None, None));
        let malformed = Request::builder()
            .method("POST")
            .uri("/api/jobs")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"command\": "))
            .unwrap();

        let (status, body) = send(app(&registry), malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"].is_string());

        let (status, body) = send(
            app(&registry),
            request("POST", "/api/jobs", Some(json!({ "argv": ["ls"] }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"].is_string());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids_are_not_found() {
        let registry = Arc::new(JobRegistry::new(None, None));

        for uri in [
            format!("/api/jobs/{}", JobId::new()),
            "/api/jobs/not-a-uuid".to_string(),
            format!("/api/jobs/{}/logs", JobId::new()),
        ] {
            let (status, _) = send(app(&registry), request("GET", &uri, None)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        }

        let (status, _) = send(
            app(&registry),
            request("POST", &format!("/api/jobs/{}/stop", JobId::new()), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stop_returns_final_status() {
        let registry = Arc::new(JobRegistry::new(None, None));
        let started = start(&registry, &["sleep", "10"]).await;

        let (status, body) = send(
            app(&registry),
            request("POST", &format!("/api/jobs/{}/stop", started.id), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let stopped: JobStatus = serde_json::from_slice(&body).unwrap();
        assert_eq!(stopped.exit_code(), Some(-9));
        assert!(registry.is_empty());

        let (status, _) = send(
            app(&registry),
            request("GET", &format!("/api/jobs/{}", started.id), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_log_stream_sends_lines_then_end() {
        let registry = Arc::new(JobRegistry::new(None, None));
        let started = start(&registry, &["sh", "-c", "echo one; echo two >&2"]).await;

        let (status, body) = send(
            app(&registry),
            request("GET", &format!("/api/jobs/{}/logs", started.id), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let body = String::from_utf8(body).unwrap();
        assert_eq!(body.matches("event: log").count(), 2);
        assert!(body.contains("\"text\":\"one\""));
        assert!(body.contains("\"text\":\"two\""));
        assert!(body.contains("\"source\":\"stderr\""));
        assert!(body.contains("id: 0"));
        assert!(body.contains("id: 1"));
        assert!(body.trim_end().ends_with("data: {}"));
        assert!(body.contains("event: end"));
    }

    #[tokio::test]
    async fn test_log_stream_resumes_from_offset() {
        let registry = Arc::new(JobRegistry::new(None, None));
        let started = start(&registry, &["sh", "-c", "echo one; echo two; echo three"]).await;

        let (status, body) = send(
            app(&registry),
            request(
                "GET",
                &format!("/api/jobs/{}/logs?offset=2", started.id),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let body = String::from_utf8(body).unwrap();
        assert_eq!(body.matches("event: log").count(), 1);
        assert!(body.contains("\"text\":\"three\""));
        assert!(body.contains("id: 2"));
    }
}
