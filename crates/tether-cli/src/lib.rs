//! tether - manage the tether daemon
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Thin command-line layer over `tether-core`: parses flags, loads the
//! installer configuration and renders results.

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tether")]
#[command(author, version, about = "tether - install and manage the tether daemon")]
pub struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the daemon binary (defaults to ~/.tether/bin)
    #[arg(long, global = true, env = "TETHER_INSTALL_ROOT")]
    pub install_root: Option<PathBuf>,

    /// GitHub repository publishing daemon releases (owner/name)
    #[arg(long, global = true, env = "TETHER_DAEMON_REPO")]
    pub repo: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage the daemon binary
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum DaemonCommands {
    /// Download and install the daemon
    Install {
        /// Install this version instead of the latest (e.g. 1.2.3 or v1.2.3)
        #[arg(long)]
        version: Option<String>,
        /// Include prereleases when picking the latest version
        #[arg(long, conflicts_with = "version")]
        prerelease: bool,
        /// Reinstall even if the daemon is already present
        #[arg(long, short = 'f')]
        force: bool,
        /// Do not verify the archive against the release checksums
        #[arg(long)]
        skip_checksum: bool,
    },
    /// Show where the daemon is installed and which version it reports
    Status,
}
