//! CLI command definitions for the `swb` binary.
//!
//! Uses clap derive macros for argument parsing. Every command reads the
//! same `switchboard.toml`; `--config` overrides its location.

pub mod candidates;
pub mod config;
pub mod stats;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use switchboard_types::provider::TaskType;

/// Inspect and operate a quota-aware completion router.
#[derive(Parser)]
#[command(name = "swb", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to switchboard.toml (defaults to the data directory).
    #[arg(long, global = true, env = "SWITCHBOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Show the ordered candidate list for a task type.
    Candidates {
        /// Task type: chat, code, creative, analysis, general.
        #[arg(long, short, default_value = "general")]
        task: TaskType,
    },

    /// Aggregate usage from the persisted log.
    Stats {
        /// How far back to look (e.g. 30m, 1h, 2d).
        #[arg(long, default_value = "1h", value_parser = stats::parse_since)]
        since: chrono::Duration,

        /// Database URL (defaults to usage.db in the data directory).
        #[arg(long, env = "SWITCHBOARD_DATABASE_URL")]
        database: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Load and validate the config file.
    Check,

    /// Print the resolved config file path.
    Path,
}

impl Cli {
    /// Tracing filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,switchboard_core=debug",
            _ => "trace",
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(switchboard_infra::config::default_config_path)
    }
}
