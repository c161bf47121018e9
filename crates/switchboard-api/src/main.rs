//! Switchboard operator CLI.
//!
//! Binary name: `swb`
//!
//! Parses CLI arguments, installs tracing, then dispatches to the command
//! handler. Commands operate on the same config file and usage database a
//! running router uses.

mod cli;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, ConfigCommand};
use switchboard_observe::tracing_setup::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_filter(), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "swb", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli.config_path();
    tracing::debug!(path = %config_path.display(), "Resolved config path");

    let result = match cli.command {
        Commands::Config { action } => match action {
            ConfigCommand::Check => cli::config::check(&config_path, cli.json, cli.quiet).await,
            ConfigCommand::Path => cli::config::path(&config_path, cli.json),
        },

        Commands::Candidates { task } => cli::candidates::list(&config_path, task, cli.json).await,

        Commands::Stats { since, database } => cli::stats::show(since, database, cli.json).await,

        Commands::Completions { .. } => Ok(()),
    };

    shutdown_tracing();
    result
}
