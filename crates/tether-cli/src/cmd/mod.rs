pub mod daemon;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tether_core::InstallerConfig;

/// Values given on the command line that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub install_root: Option<PathBuf>,
    pub repo: Option<String>,
}

/// Load `~/.tether/config.toml` and the environment, then apply `overrides`.
pub fn load_config(overrides: &Overrides) -> Result<InstallerConfig> {
    let mut config = InstallerConfig::load().context("Failed to load configuration")?;
    if let Some(root) = &overrides.install_root {
        config.install_root.clone_from(root);
    }
    if let Some(repo) = &overrides.repo {
        config.repo.clone_from(repo);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
