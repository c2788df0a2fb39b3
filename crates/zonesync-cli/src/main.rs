//! zonesync CLI - inspect local sync state and exercise the zone client
//!
//! Works on the local state database (change tokens and pending status
//! changes) and can run a two-client simulation against an in-memory service.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::simulate::{run_simulate, SimulationOptions};
use crate::commands::status::run_status;
use crate::commands::token::run_token;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zonesync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Token { command } => run_token(&command, &db_path).await?,
        Commands::Status { command } => run_status(&command, &db_path).await?,
        Commands::Simulate {
            articles,
            batch_limit,
            faults,
            json,
        } => {
            let options = SimulationOptions {
                articles,
                batch_limit,
                faults,
            };
            run_simulate(options, json).await?;
        }
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
