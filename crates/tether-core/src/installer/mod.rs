//! Install pipeline for the daemon binary.
//!
//! [`Installer::install`] resolves the host target and the wanted release,
//! downloads the matching archive into the install root, verifies it against
//! the release's checksum manifest, unpacks it into a staging directory and
//! renames the executable onto the canonical path. Every failure is reported
//! through [`InstallResult`]; nothing is left behind in the install root but
//! the canonical binary.

mod lock;
mod probe;

pub use lock::InstallLock;
pub use probe::{parse_version_output, probe_installed_version};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;

use crate::asset;
use crate::config::{ConfigError, InstallerConfig};
use crate::error::{ErrorKind, InstallError};
use crate::io::checksum::{self, Verdict};
use crate::io::download::{Downloader, Progress, ProgressFn};
use crate::io::extract::{ArchiveExtractor, ArchiveTool};
use crate::platform::PlatformTarget;
use crate::release::{Asset, GitHubReleases, Release, ReleaseSource};
use crate::version;

/// What to install and how.
#[derive(Clone, Default)]
pub struct InstallOptions {
    /// Exact version or tag (`1.2.3` and `v1.2.3` are equivalent). `None`
    /// installs the latest release.
    pub version: Option<String>,
    /// Consider prereleases when resolving the latest release.
    pub prerelease: bool,
    /// Reinstall even if a binary is already present.
    pub force: bool,
    pub skip_checksum: bool,
    pub on_progress: Option<ProgressFn>,
}

impl InstallOptions {
    pub fn with_progress(mut self, f: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for InstallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallOptions")
            .field("version", &self.version)
            .field("prerelease", &self.prerelease)
            .field("force", &self.force)
            .field("skip_checksum", &self.skip_checksum)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Outcome of one [`Installer::install`] call. Either every success field is
/// set or `error` is.
#[derive(Debug)]
pub struct InstallResult {
    pub success: bool,
    /// Installed version, without the tag's leading `v`.
    pub version: Option<String>,
    pub binary_path: Option<PathBuf>,
    pub error: Option<InstallError>,
    /// Tag of a newer prerelease, when the binary replaced by this call was
    /// itself a prerelease. Informational only.
    pub newer_prerelease: Option<String>,
}

impl InstallResult {
    fn succeeded(version: String, binary_path: PathBuf) -> Self {
        Self {
            success: true,
            version: Some(version),
            binary_path: Some(binary_path),
            error: None,
            newer_prerelease: None,
        }
    }

    fn failed(error: InstallError) -> Self {
        Self {
            success: false,
            version: None,
            binary_path: None,
            error: Some(error),
            newer_prerelease: None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(InstallError::kind)
    }
}

struct Installed {
    version: String,
    binary_path: PathBuf,
    previous: Option<String>,
}

/// Removes a file when dropped, ignoring a file that is already gone.
struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!("Removed {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove {}: {e}", self.0.display()),
        }
    }
}

/// Installs and replaces the daemon binary.
pub struct Installer {
    config: InstallerConfig,
    releases: Arc<dyn ReleaseSource>,
    downloader: Downloader,
    extractor: ArchiveExtractor,
    target: Option<PlatformTarget>,
}

impl fmt::Debug for Installer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installer")
            .field("config", &self.config)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Installer talking to GitHub with the configured archive tool.
    pub fn new(config: InstallerConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn builder(config: InstallerConfig) -> InstallerBuilder {
        InstallerBuilder {
            config,
            releases: None,
            archive_tool: None,
            target: None,
        }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Target to install for: the override given to the builder, or the host.
    pub fn target(&self) -> Result<PlatformTarget, InstallError> {
        match &self.target {
            Some(target) => Ok(target.clone()),
            None => PlatformTarget::current(),
        }
    }

    pub fn canonical_path(&self) -> Result<PathBuf, InstallError> {
        self.target().map(|t| self.config.canonical_path(&t))
    }

    /// Version reported by the installed binary, if any.
    pub async fn installed_version(&self) -> Option<String> {
        let path = self.canonical_path().ok()?;
        probe_installed_version(&path, self.config.probe_timeout).await
    }

    /// Run the whole pipeline. Never panics or returns early with an error;
    /// failures land in [`InstallResult::error`].
    pub async fn install(&self, options: &InstallOptions) -> InstallResult {
        match self.run(options).await {
            Ok(installed) => {
                tracing::info!(
                    "Installed {} {} at {}",
                    self.config.binary_name,
                    installed.version,
                    installed.binary_path.display()
                );
                let newer = self
                    .prerelease_advisory(options, installed.previous.as_deref(), &installed.version)
                    .await;
                let mut result = InstallResult::succeeded(installed.version, installed.binary_path);
                result.newer_prerelease = newer;
                result
            }
            Err(e) => {
                tracing::debug!("Install failed: {e}");
                InstallResult::failed(e)
            }
        }
    }

    async fn run(&self, options: &InstallOptions) -> Result<Installed, InstallError> {
        let config = &self.config;
        let target = self.target()?;
        let binary_path = config.canonical_path(&target);
        tracing::debug!("Target {target}, install path {}", binary_path.display());

        if !options.force && binary_path.exists() {
            return Err(InstallError::AlreadyInstalled { path: binary_path });
        }

        let previous = if options.version.is_none() && !options.prerelease {
            probe_installed_version(&binary_path, config.probe_timeout).await
        } else {
            None
        };

        let release = self.resolve_release(options).await?;
        tracing::info!("Resolved release {} of {}", release.tag, config.repo);

        let asset = asset::select_asset(&release, &target, &config.binary_name)?;
        tracing::debug!("Selected asset {}", asset.name);

        let root = &config.install_root;
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| InstallError::fs("create", root, e))?;

        let _lock = InstallLock::acquire(
            &InstallLock::path_for(root, &config.binary_name),
            config.lock_stale_after,
        )?;

        let archive_path = root.join(&asset.name);
        let _archive = RemoveOnDrop(archive_path.clone());

        tracing::info!("Downloading {}", asset.download_url);
        self.downloader
            .download(&asset.download_url, &archive_path, options.on_progress.as_ref())
            .await?;

        if options.skip_checksum {
            tracing::warn!(
                "Skipping checksum verification for {}; the archive is unverified",
                asset.name
            );
        } else {
            self.verify_checksum(&release, asset, &archive_path).await?;
        }

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(root)
            .map_err(|e| InstallError::fs("create staging directory in", root, e))?;
        let extracted = self
            .extractor
            .extract(
                &archive_path,
                staging.path(),
                &target.executable_name(&config.binary_name),
            )
            .await?;

        replace_binary(&extracted, &binary_path)?;
        make_executable(&binary_path)?;

        Ok(Installed {
            version: release.version().to_string(),
            binary_path,
            previous,
        })
    }

    async fn resolve_release(&self, options: &InstallOptions) -> Result<Release, InstallError> {
        match &options.version {
            Some(v) => {
                self.releases
                    .by_tag(&self.config.repo, &version::to_tag(v))
                    .await
            }
            None => {
                self.releases
                    .latest(&self.config.repo, options.prerelease)
                    .await
            }
        }
    }

    async fn verify_checksum(
        &self,
        release: &Release,
        asset: &Asset,
        archive_path: &Path,
    ) -> Result<(), InstallError> {
        let manifest_name = &self.config.checksums_asset;
        let mismatch = |reason: String| InstallError::ChecksumMismatch {
            asset: asset.name.clone(),
            reason,
        };

        let manifest_asset = release
            .asset(manifest_name)
            .ok_or_else(|| mismatch(format!("release {} has no {manifest_name}", release.tag)))?;
        let manifest = self
            .downloader
            .fetch_text(&manifest_asset.download_url)
            .await?;

        let path = archive_path.to_path_buf();
        let name = asset.name.clone();
        let verdict = tokio::task::spawn_blocking(move || checksum::check(&path, &name, &manifest))
            .await
            .map_err(|e| InstallError::Io {
                action: "hash",
                path: archive_path.to_path_buf(),
                source: std::io::Error::other(e),
            })??;

        match verdict {
            Verdict::Match => {
                tracing::debug!("Checksum verified for {}", asset.name);
                Ok(())
            }
            Verdict::NotListed => Err(mismatch(format!("not listed in {manifest_name}"))),
            Verdict::Mismatch { expected, actual } => {
                Err(mismatch(format!("expected sha256 {expected}, got {actual}")))
            }
        }
    }

    async fn prerelease_advisory(
        &self,
        options: &InstallOptions,
        previous: Option<&str>,
        installed: &str,
    ) -> Option<String> {
        if options.version.is_some() || options.prerelease {
            return None;
        }
        let previous = previous.filter(|v| version::is_prerelease(v))?;

        match self.releases.latest(&self.config.repo, true).await {
            Ok(candidate) if version::is_newer_version(installed, candidate.version()) => {
                tracing::info!(
                    "Replaced prerelease {previous}; newer prerelease {} is available",
                    candidate.tag
                );
                Some(candidate.tag)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Prerelease check failed: {e}");
                None
            }
        }
    }
}

/// Move `extracted` onto `canonical`, removing whatever was there first.
fn replace_binary(extracted: &Path, canonical: &Path) -> Result<(), InstallError> {
    if extracted == canonical {
        return Ok(());
    }
    match std::fs::remove_file(canonical) {
        Ok(()) => tracing::debug!("Removed previous {}", canonical.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(InstallError::fs("remove", canonical, e)),
    }
    std::fs::rename(extracted, canonical).map_err(|e| InstallError::fs("rename", canonical, e))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| InstallError::fs("chmod", path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), InstallError> {
    Ok(())
}

/// Builder for [`Installer`] with optional collaborators swapped out.
pub struct InstallerBuilder {
    config: InstallerConfig,
    releases: Option<Arc<dyn ReleaseSource>>,
    archive_tool: Option<Arc<dyn ArchiveTool>>,
    target: Option<PlatformTarget>,
}

impl fmt::Debug for InstallerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallerBuilder")
            .field("config", &self.config)
            .field("archive_tool", &self.archive_tool)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl InstallerBuilder {
    pub fn release_source(mut self, releases: Arc<dyn ReleaseSource>) -> Self {
        self.releases = Some(releases);
        self
    }

    pub fn archive_tool(mut self, tool: Arc<dyn ArchiveTool>) -> Self {
        self.archive_tool = Some(tool);
        self
    }

    /// Install for `target` instead of the host.
    pub fn target(mut self, target: PlatformTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn build(self) -> Result<Installer, ConfigError> {
        let config = self.config;
        config.validate()?;
        let client: Client = config.http_client()?;

        let releases = self.releases.unwrap_or_else(|| {
            Arc::new(GitHubReleases::new(
                client.clone(),
                &config.api_base_url,
                config.request_timeout,
            ))
        });
        let tool = self
            .archive_tool
            .unwrap_or_else(|| config.archive_tool.build(config.extract_timeout));

        Ok(Installer {
            downloader: Downloader::new(
                client,
                config.download_idle_timeout,
                config.request_timeout,
            ),
            extractor: ArchiveExtractor::new(tool),
            releases,
            target: self.target,
            config,
        })
    }
}
