//! Configuration module
//!
//! Handles CLI configuration: where the server is and how to authenticate.

use anyhow::{Context, Result};
use rexec_client::RexecClient;
use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the server
    pub server_url: String,
    /// Bearer token sent with every API request
    pub token: Option<String>,
    /// Extra CA certificate to trust
    pub ca_cert: Option<PathBuf>,
    /// Deadline of every request except log streams
    pub request_timeout: Duration,
}

impl Config {
    /// Builds an API client for this configuration
    pub fn client(&self) -> Result<RexecClient> {
        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(5));

        if let Some(path) = &self.ca_cert {
            let pem = std::fs::read(path)
                .with_context(|| format!("Failed to read CA certificate {}", path.display()))?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("Invalid CA certificate {}", path.display()))?;
            builder = builder.add_root_certificate(certificate);
        }

        let http = builder.build().context("Failed to build HTTP client")?;
        let client = RexecClient::with_client(&self.server_url, http)
            .with_request_timeout(self.request_timeout);

        Ok(match &self.token {
            Some(token) => client.with_token(token),
            None => client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            server_url: "http://localhost:8080/".to_string(),
            token: Some("s3cret".to_string()),
            ca_cert: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_client_uses_server_url() {
        let client = config().client().unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_missing_ca_certificate_is_an_error() {
        let config = Config {
            ca_cert: Some(PathBuf::from("/definitely/not/a/cert.pem")),
            ..config()
        };
        let err = config.client().unwrap_err();
        assert!(err.to_string().contains("Failed to read CA certificate"));
    }
}
