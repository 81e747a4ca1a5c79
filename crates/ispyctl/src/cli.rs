//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap.
//! Keeps argument parsing separate from execution logic.

use clap::{ArgAction, Parser, Subcommand};
use ispy_engine::Metric;
use std::path::PathBuf;

/// iSpy device diagnostics CLI
#[derive(Parser, Debug)]
#[command(name = "ispyctl")]
#[command(about = "iSpy - iOS device diagnostics", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (overrides $ISPY_CONFIG and the default locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fixed RNG seed for reproducible runs
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Select the device whose identifier starts with this prefix
    #[arg(long, global = true)]
    pub device: Option<String>,

    /// Debug logging to stderr
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand (if not provided, runs a full scan)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Scan {
            module: None,
            json: false,
        })
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// List devices, the selected one is marked
    Devices {
        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Run every diagnostic module, or a single one
    Scan {
        /// Module key (battery, storage, network, ...)
        #[arg(long)]
        module: Option<String>,

        /// Output JSON only
        #[arg(long)]
        json: bool,
    },

    /// Full scan followed by a markdown diagnostic and analytics report
    Report {
        /// Write the report to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Sample the device over refresh ticks and print trend analysis
    Analytics {
        /// Number of samples to collect
        #[arg(long, default_value_t = 5)]
        samples: usize,

        /// Analysis window in days
        #[arg(long, default_value_t = 30)]
        days: i64,

        /// Also print the chart series for one metric
        /// (battery, cycles, storage, thermal)
        #[arg(long, value_name = "METRIC")]
        chart: Option<Metric>,
    },

    /// Talk to the diagnostics assistant
    Chat,
}
