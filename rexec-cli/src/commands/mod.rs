//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start a new remote job
    Start {
        /// Program followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Stop a remote job and show its final status
    Stop {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// List all remote jobs
    List,
    /// Show the status of a remote job
    Status {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Stream the output of a remote job until it ends
    Logs {
        /// Job ID or unambiguous prefix
        id: String,

        /// Index of the first line to show
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

/// Handle a CLI command
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        Commands::Start { command } => job::start_job(&client, command).await,
        Commands::Stop { id } => job::stop_job(&client, &id).await,
        Commands::List => job::list_jobs(&client).await,
        Commands::Status { id } => job::show_status(&client, &id).await,
        Commands::Logs { id, offset } => job::stream_logs(&client, &id, offset).await,
    }
}
