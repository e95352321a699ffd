//! Untangle CLI - Financial chaos scanner
//!
//! Usage:
//!   untangle scan --file facts.json           Scan a fact set for issues
//!   untangle scan --file facts.json --json    Emit the full report as JSON
//!   untangle canonicalize "POS DEBIT WALMART" Show the canonical entity key
//!   untangle modes --file facts.json          Show the scan-mode decision

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Scan {
            file,
            json,
            config,
            max_issues,
        } => commands::cmd_scan(&file, json, config.as_deref(), max_issues),
        Commands::Canonicalize { description } => commands::cmd_canonicalize(&description),
        Commands::Modes { file } => commands::cmd_modes(&file),
    }
}
