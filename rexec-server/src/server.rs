//! HTTP(S) serving
//!
//! Runs the router until a shutdown signal arrives. Every supervised process
//! is killed as part of the shutdown itself: open log streams only end once
//! their job's output is closed, and graceful shutdown waits for them.

use anyhow::{Context, Result};
use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use crate::jobs::JobRegistry;

/// Longest time TLS connections get to finish once the jobs are killed
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Loads a PEM certificate chain and private key
pub async fn load_tls(cert: &Path, key: &Path) -> Result<RustlsConfig> {
    RustlsConfig::from_pem_file(cert, key).await.with_context(|| {
        format!(
            "Failed to load TLS key pair ({}, {})",
            cert.display(),
            key.display()
        )
    })
}

/// Serves plain HTTP on `listener` until `signal` completes
pub async fn serve(
    listener: TcpListener,
    app: Router,
    registry: Arc<JobRegistry>,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(kill_jobs_after(registry, signal))
        .await
        .context("Server error")
}

/// Serves HTTPS on `addr` until `signal` completes
pub async fn serve_tls(
    addr: SocketAddr,
    tls: RustlsConfig,
    app: Router,
    registry: Arc<JobRegistry>,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let handle = Handle::new();

    let shutdown = handle.clone();
    tokio::spawn(async move {
        kill_jobs_after(registry, signal).await;
        shutdown.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
    });

    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("Server error")
}

async fn kill_jobs_after(registry: Arc<JobRegistry>, signal: impl Future<Output = ()>) {
    signal.await;
    info!("Shutting down, killing {} job(s)", registry.len());
    registry.kill_all().await;
}
