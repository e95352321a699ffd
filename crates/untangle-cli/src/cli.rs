//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Untangle - Find chaos in financial records
#[derive(Parser)]
#[command(name = "untangle")]
#[command(about = "Deterministic scanner for billing and bank-statement chaos", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a fact file and report chaos issues
    Scan {
        /// JSON file containing an array of facts
        #[arg(short, long)]
        file: PathBuf,

        /// Emit the full analysis report as JSON
        #[arg(long)]
        json: bool,

        /// TOML file overriding detection thresholds
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cap on the number of reported issues
        #[arg(long)]
        max_issues: Option<usize>,
    },

    /// Show the canonical entity key for a raw description
    Canonicalize {
        /// Raw statement text, e.g. "POS DEBIT WALMART STORE #1234"
        description: String,
    },

    /// Show the scan-mode decision for a fact file
    Modes {
        /// JSON file containing an array of facts
        #[arg(short, long)]
        file: PathBuf,
    },
}
