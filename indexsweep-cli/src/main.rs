//! Indexsweep - reconciliation sweeps for a secondary search index.
//!
//! One binary, four verbs:
//! - `run` sweeps duplicate copies out of the index, once
//! - `audit` reports inconsistencies without touching anything
//! - `stats` reports corpus-wide entity counts from the API
//! - `watch` runs passes on a fixed cadence until stopped
//!
//! Exit status is non-zero only when a command fails to start; a pass that
//! runs but leaves work behind reports it in the summary and exits zero.

#![allow(clippy::print_stdout, reason = "CLI tool outputs to stdout")]

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level: Level = cli.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    match cli.command {
        Commands::Run { sweep, json } => commands::run_pass(sweep.into_config(), json).await,
        Commands::Audit {
            sweep,
            window_hours,
            json,
        } => commands::run_audit(sweep.into_config(), window_hours, json).await,
        Commands::Stats {
            sweep,
            entities,
            record,
            json,
        } => commands::run_stats(sweep.into_config(), entities, record, json).await,
        Commands::Watch { sweep, every } => commands::run_watch(sweep.into_config(), every).await,
    }
}
