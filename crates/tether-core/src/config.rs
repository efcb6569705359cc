//! Installer configuration.
//!
//! Values are layered: built-in defaults, then the `[installer]` table of
//! `{home}/config.toml`, then environment variables. The installer itself
//! never reads the environment; everything it needs lives in
//! [`InstallerConfig`].
//!
//! ```toml
//! [installer]
//! repo = "tether-dev/tetherd"
//! install_root = "/opt/tether/bin"
//! archive_tool = "native"
//! download_idle_timeout_secs = 60
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header;
use serde::Deserialize;
use thiserror::Error;

use crate::io::extract::ArchiveToolKind;
use crate::paths;
use crate::platform::PlatformTarget;

pub const DEFAULT_REPO: &str = "tether-dev/tetherd";
pub const DEFAULT_BINARY_NAME: &str = "tetherd";
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_CHECKSUMS_ASSET: &str = "checksums.txt";

pub const REPO_ENV: &str = "TETHER_DAEMON_REPO";
pub const INSTALL_ROOT_ENV: &str = "TETHER_INSTALL_ROOT";
pub const API_URL_ENV: &str = "TETHER_API_URL";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine home directory. Set {} to override", paths::HOME_ENV)]
    NoHome,

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Everything an [`Installer`](crate::Installer) needs to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerConfig {
    /// `owner/name` of the repository publishing daemon releases.
    pub repo: String,
    pub binary_name: String,
    pub install_root: PathBuf,
    pub api_base_url: String,
    /// Release asset holding the sha256 manifest.
    pub checksums_asset: String,
    pub token: Option<String>,
    pub connect_timeout: Duration,
    /// Per-request bound for API calls and manifest fetches.
    pub request_timeout: Duration,
    /// Longest wait for the next chunk of a download body.
    pub download_idle_timeout: Duration,
    pub extract_timeout: Duration,
    pub probe_timeout: Duration,
    /// Age after which an install lock is considered abandoned.
    pub lock_stale_after: Duration,
    pub archive_tool: ArchiveToolKind,
}

impl InstallerConfig {
    /// Defaults for everything except the install root.
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            repo: DEFAULT_REPO.to_string(),
            binary_name: DEFAULT_BINARY_NAME.to_string(),
            install_root: install_root.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            checksums_asset: DEFAULT_CHECKSUMS_ASSET.to_string(),
            token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            download_idle_timeout: Duration::from_secs(30),
            extract_timeout: Duration::from_secs(120),
            probe_timeout: Duration::from_secs(5),
            lock_stale_after: Duration::from_secs(10 * 60),
            archive_tool: ArchiveToolKind::default(),
        }
    }

    /// Load from the process environment and `{home}/config.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load, reading environment variables through `env`.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let home = paths::tether_home_with(&env).ok_or(ConfigError::NoHome)?;
        let mut config = Self::new(paths::bin_dir(&home));

        let file = paths::config_file(&home);
        match std::fs::read_to_string(&file) {
            Ok(text) => config.apply_file(&file, &text)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(ConfigError::Read { path: file, source }),
        }

        config.apply_env(&env);
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path, text: &str) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let s = file.installer;

        if let Some(v) = s.repo {
            self.repo = v;
        }
        if let Some(v) = s.binary_name {
            self.binary_name = v;
        }
        if let Some(v) = s.install_root {
            self.install_root = v;
        }
        if let Some(v) = s.api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = s.checksums_asset {
            self.checksums_asset = v;
        }
        if let Some(v) = s.token {
            self.token = Some(v);
        }
        if let Some(v) = s.archive_tool {
            self.archive_tool = v;
        }

        let secs = |v: Option<u64>, slot: &mut Duration| {
            if let Some(v) = v {
                *slot = Duration::from_secs(v);
            }
        };
        secs(s.connect_timeout_secs, &mut self.connect_timeout);
        secs(s.request_timeout_secs, &mut self.request_timeout);
        secs(s.download_idle_timeout_secs, &mut self.download_idle_timeout);
        secs(s.extract_timeout_secs, &mut self.extract_timeout);
        secs(s.probe_timeout_secs, &mut self.probe_timeout);
        secs(s.lock_stale_after_secs, &mut self.lock_stale_after);
        Ok(())
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(REPO_ENV) {
            self.repo = v;
        }
        if let Some(v) = get(INSTALL_ROOT_ENV) {
            self.install_root = PathBuf::from(v);
        }
        if let Some(v) = get(API_URL_ENV) {
            self.api_base_url = v;
        }
        if let Some(v) = get(TOKEN_ENV) {
            self.token = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let repo_ok = self
            .repo
            .split_once('/')
            .is_some_and(|(owner, name)| {
                !owner.is_empty() && !name.is_empty() && !name.contains('/')
            });
        if !repo_ok {
            return Err(ConfigError::Invalid {
                key: "repo",
                reason: format!("expected owner/name, got {:?}", self.repo),
            });
        }
        if self.binary_name.is_empty() || self.binary_name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                key: "binary_name",
                reason: format!("not a plain file name: {:?}", self.binary_name),
            });
        }
        if self.install_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "install_root",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Where the daemon lives for `target`: `{install_root}/{binary}[.exe]`.
    pub fn canonical_path(&self, target: &PlatformTarget) -> PathBuf {
        self.install_root
            .join(target.executable_name(&self.binary_name))
    }

    /// HTTP client shared by the release catalog and the downloader.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(crate::USER_AGENT),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );

        if let Some(t) = &self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {t}")).map_err(|e| {
                ConfigError::Invalid {
                    key: "token",
                    reason: e.to_string(),
                }
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }

        Ok(reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(self.connect_timeout)
            .build()?)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    installer: InstallerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct InstallerSection {
    repo: Option<String>,
    binary_name: Option<String>,
    install_root: Option<PathBuf>,
    api_base_url: Option<String>,
    checksums_asset: Option<String>,
    token: Option<String>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    download_idle_timeout_secs: Option<u64>,
    extract_timeout_secs: Option<u64>,
    probe_timeout_secs: Option<u64>,
    lock_stale_after_secs: Option<u64>,
    archive_tool: Option<ArchiveToolKind>,
}
