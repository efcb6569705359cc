//! Release catalog access.
//!
//! [`ReleaseSource`] is the seam between the installer and wherever releases
//! are published. [`GitHubReleases`] is the production implementation; tests
//! substitute canned releases.

mod github;

pub use github::GitHubReleases;

use async_trait::async_trait;

use crate::error::InstallError;
use crate::version;

/// A published, immutable release. Identity is the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag: String,
    pub prerelease: bool,
    pub assets: Vec<Asset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub download_url: String,
}

impl Release {
    /// The tag without its leading `v`.
    pub fn version(&self) -> &str {
        version::strip_tag_prefix(&self.tag)
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.name == name)
    }

    pub fn asset_names(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.name.clone()).collect()
    }
}

/// A catalog that can look up daemon releases.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch the newest release. With `include_prerelease == false` only
    /// stable releases qualify.
    ///
    /// # Errors
    ///
    /// `ReleaseNotFound` when nothing qualifies, `Network` on transport failure.
    async fn latest(&self, repo: &str, include_prerelease: bool) -> Result<Release, InstallError>;

    /// Fetch the release with exactly this tag.
    ///
    /// # Errors
    ///
    /// `ReleaseNotFound` for unknown tags, `Network` on transport failure.
    async fn by_tag(&self, repo: &str, tag: &str) -> Result<Release, InstallError>;
}
