//! `tether daemon` subcommands.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tether_core::{ErrorKind, InstallOptions, Installer};

use super::{Overrides, load_config};
use crate::ui;

/// Flags of `tether daemon install`.
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    pub version: Option<String>,
    pub prerelease: bool,
    pub force: bool,
    pub skip_checksum: bool,
}

pub async fn install(overrides: &Overrides, args: InstallArgs) -> Result<ExitCode> {
    let config = load_config(overrides)?;
    let installer = Installer::new(config).context("Failed to set up installer")?;

    if args.skip_checksum {
        ui::warn("Checksum verification is disabled for this install");
    }

    let line = ui::DownloadLine::new();
    let options = InstallOptions {
        version: args.version,
        prerelease: args.prerelease,
        force: args.force,
        skip_checksum: args.skip_checksum,
        on_progress: Some(line.reporter()),
    };

    let result = installer.install(&options).await;
    line.finish();

    if let Some(err) = &result.error {
        ui::error(&err.to_string());
        if err.kind() == ErrorKind::ChecksumMismatch {
            ui::warn(
                "The downloaded archive was discarded. \
                 Retry, or pass --skip-checksum at your own risk",
            );
        }
        return Ok(ExitCode::FAILURE);
    }

    let version = result.version.as_deref().unwrap_or("unknown");
    let path = result
        .binary_path
        .as_deref()
        .map_or_else(|| "unknown".to_string(), |p| p.display().to_string());
    ui::success(&format!(
        "Installed {} {version} at {path}",
        installer.config().binary_name
    ));

    if let Some(tag) = &result.newer_prerelease {
        ui::info(&format!(
            "A newer prerelease ({tag}) is available. \
             Run `tether daemon install --prerelease --force` to switch"
        ));
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn status(overrides: &Overrides) -> Result<ExitCode> {
    let config = load_config(overrides)?;
    let installer = Installer::new(config).context("Failed to set up installer")?;

    let path = match installer.canonical_path() {
        Ok(path) => path,
        Err(e) => {
            ui::error(&e.to_string());
            return Ok(ExitCode::FAILURE);
        }
    };

    if !path.exists() {
        ui::info(&format!("Daemon is not installed (expected at {})", path.display()));
        ui::info("Run `tether daemon install` to install it");
        return Ok(ExitCode::SUCCESS);
    }

    match installer.installed_version().await {
        Some(version) => ui::success(&format!(
            "{} {version} at {}",
            installer.config().binary_name,
            path.display()
        )),
        None => ui::warn(&format!(
            "{} exists but did not report a version",
            path.display()
        )),
    }
    Ok(ExitCode::SUCCESS)
}
