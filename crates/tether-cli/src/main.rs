//! tether CLI

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tether_cli::cmd;
use tether_cli::{Cli, Commands, DaemonCommands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let overrides = cmd::Overrides {
        install_root: cli.install_root,
        repo: cli.repo,
    };

    match cli.command {
        Commands::Daemon { command } => match command {
            DaemonCommands::Install {
                version,
                prerelease,
                force,
                skip_checksum,
            } => {
                let args = cmd::daemon::InstallArgs {
                    version,
                    prerelease,
                    force,
                    skip_checksum,
                };
                cmd::daemon::install(&overrides, args).await
            }
            DaemonCommands::Status => cmd::daemon::status(&overrides).await,
        },
    }
}
