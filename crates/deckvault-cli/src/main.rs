//! Deckvault CLI - browse and refresh the local card catalog mirror
//!
//! Shares the on-device mirror and sync engine with the app shells.

mod cli;
mod commands;
mod error;

use std::env;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_config;
use crate::commands::install_id::run_install_id;
use crate::commands::list::run_list;
use crate::commands::run::run_app;
use crate::commands::show::run_show;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
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
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deckvault=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli.global, |key| env::var(key).ok())?;

    match cli.command {
        Commands::Sync { full, json } => run_sync(&config, full, json).await?,
        Commands::Status { runs, json } => run_status(&config, runs, json).await?,
        Commands::List { filter, json } => run_list(&config, &filter, json).await?,
        Commands::Show { id, json } => run_show(&config, &id, json).await?,
        Commands::Run => run_app(&config).await?,
        Commands::InstallId => run_install_id(&config).await?,
    }

    Ok(())
}
