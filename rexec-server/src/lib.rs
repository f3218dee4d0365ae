//! Rexec Server
//!
//! Runs commands on behalf of remote clients and supervises the resulting
//! processes.
//!
//! - [`jobs`]: process supervision, output capture, resource limits and usage
//! - [`api`]: authenticated HTTP endpoints, including a live log stream
//! - [`config`]: settings loaded from the environment
//! - [`server`]: plain or TLS serving with job cleanup on shutdown

pub mod api;
pub mod config;
pub mod jobs;
pub mod server;
