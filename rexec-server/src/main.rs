//! Rexec Server binary
//!
//! Loads the configuration and serves the API, over TLS when a key pair is
//! configured, until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rexec_server::api::{self, AppState};
use rexec_server::config::Config;
use rexec_server::jobs::{
    CgroupLimits, JobRegistry, ResourceLimitGroup, SysinfoSampler, UsageSampler,
};
use rexec_server::server;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rexec_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rexec Server");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    info!(
        "Loaded configuration: bind_addr={}, auth={}, tls={}, limits={}, sample_usage={}",
        config.bind_addr,
        config.token.is_some(),
        config.tls().is_some(),
        config.limits,
        config.sample_usage
    );
    if config.token.is_none() {
        warn!("REXEC_TOKEN is not set, the API accepts unauthenticated requests over plain HTTP");
    }

    let limits: Option<Arc<dyn ResourceLimitGroup>> = if config.limits {
        let group = CgroupLimits::create(
            &config.cgroup_root,
            &config.cgroup_name,
            &config.cpu_max,
            &config.memory_max,
        )
        .context("Failed to set up resource limits")?;
        Some(Arc::new(group))
    } else {
        None
    };

    let sampler: Option<Arc<dyn UsageSampler>> = if config.sample_usage {
        Some(Arc::new(SysinfoSampler::new()))
    } else {
        None
    };

    let registry = Arc::new(JobRegistry::new(limits, sampler));

    // Build router with all API endpoints
    let app = api::create_router(AppState::new(
        Arc::clone(&registry),
        config.token.clone(),
    ));

    match config.tls() {
        Some((cert, key)) => {
            let tls = server::load_tls(cert, key).await?;
            let addr: SocketAddr = config.bind_addr.parse()?;
            info!("Listening on https://{}", addr);
            server::serve_tls(addr, tls, app, registry, shutdown_signal()).await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(&config.bind_addr)
                .await
                .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
            info!("Listening on http://{}", config.bind_addr);
            server::serve(listener, app, registry, shutdown_signal()).await?;
        }
    }

    Ok(())
}

/// Completes on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
