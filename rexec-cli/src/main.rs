//! Rexec CLI
//!
//! Command-line interface for running and supervising commands on a Rexec server.

mod commands;
mod config;
mod id_resolver;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rexec")]
#[command(about = "Run and supervise commands on a remote Rexec server", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(long, env = "REXEC_SERVER_URL", default_value = "http://localhost:8080")]
    server_url: String,

    /// Bearer token for the server API
    #[arg(long, env = "REXEC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// PEM file with an extra CA certificate to trust for https:// URLs
    #[arg(long, env = "REXEC_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Seconds to wait for a reply (log streams are not bounded)
    #[arg(long, env = "REXEC_TIMEOUT", default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
        token: cli.token,
        ca_cert: cli.ca_cert,
        request_timeout: Duration::from_secs(cli.timeout),
    };

    handle_command(cli.command, &config).await
}
