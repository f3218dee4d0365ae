//! Rexec HTTP Client
//!
//! A simple, type-safe HTTP client for the Rexec server API.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use rexec_client::RexecClient;
//!
//! #[tokio::main]
//! async fn main() -> rexec_client::Result<()> {
//!     let client = RexecClient::new("http://localhost:8080").with_token("s3cret");
//!
//!     let job = client.start_job(vec!["echo".into(), "hello".into()]).await?;
//!     println!("Started job: {}", job.id);
//!
//!     let mut logs = client.stream_logs(job.id, 0).await?;
//!     while let Some(entry) = logs.next().await {
//!         println!("{}", entry?.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod logs;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use logs::LogStream;

use reqwest::{Client, Method, RequestBuilder};
use rexec_core::dto::error::ErrorBody;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the Rexec server API
#[derive(Debug, Clone)]
pub struct RexecClient {
    /// Base URL of the server (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Bearer token sent with every API request
    token: Option<String>,
    /// Deadline of requests that return a single response
    request_timeout: Option<Duration>,
}

impl RexecClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server
    /// * `client` - A configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
            request_timeout: None,
        }
    }

    /// Authenticate every API request with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Bound every request except log streams by `timeout`
    ///
    /// Stopping a job waits for the process to exit, so the timeout should
    /// leave room for the server's stop bound.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request to `path`, authenticated if a token is set
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Build a request expecting a single response, bounded by the request timeout
    fn unary(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.request(method, path);
        match self.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Turn a non-success response into a [`ClientError::ApiError`]
    ///
    /// The message is taken from the JSON error body when there is one.
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ErrorBody>(&error_text)
            .map(|body| body.error)
            .unwrap_or(error_text);

        Err(ClientError::api_error(status.as_u16(), message))
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        self.check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
