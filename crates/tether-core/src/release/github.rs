//! GitHub REST API release catalog.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Asset, Release, ReleaseSource};
use crate::error::InstallError;
use crate::version;

/// Releases listed when searching prerelease-inclusive; newest come first.
const RELEASE_PAGE_SIZE: u32 = 30;

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

impl From<GithubRelease> for Release {
    fn from(r: GithubRelease) -> Self {
        Self {
            tag: r.tag_name,
            prerelease: r.prerelease,
            assets: r
                .assets
                .into_iter()
                .map(|a| Asset {
                    name: a.name,
                    download_url: a.browser_download_url,
                })
                .collect(),
        }
    }
}

/// [`ReleaseSource`] backed by `https://api.github.com` (or a compatible mirror).
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    client: Client,
    api_base_url: String,
    request_timeout: Duration,
}

impl GitHubReleases {
    pub fn new(client: Client, api_base_url: &str, request_timeout: Duration) -> Self {
        Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    /// GET `url` and decode it. `Ok(None)` means the server answered 404.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, InstallError> {
        tracing::debug!("GET {url}");
        let resp = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| InstallError::network(url, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(InstallError::network(url, format!("HTTP {status}")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| InstallError::network(url, e))?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| InstallError::network(url, format!("invalid release payload: {e}")))
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    async fn latest(&self, repo: &str, include_prerelease: bool) -> Result<Release, InstallError> {
        let not_found = || InstallError::ReleaseNotFound {
            repo: repo.to_string(),
            wanted: if include_prerelease {
                "latest release (including prereleases)".to_string()
            } else {
                "latest stable release".to_string()
            },
        };

        if !include_prerelease {
            let url = format!("{}/repos/{repo}/releases/latest", self.api_base_url);
            return self
                .get_json::<GithubRelease>(&url)
                .await?
                .map(Release::from)
                .ok_or_else(not_found);
        }

        let url = format!(
            "{}/repos/{repo}/releases?per_page={RELEASE_PAGE_SIZE}",
            self.api_base_url
        );
        let releases: Vec<GithubRelease> = self.get_json(&url).await?.unwrap_or_default();

        releases
            .into_iter()
            .filter(|r| !r.draft)
            .map(Release::from)
            .max_by(|a, b| version::compare(a.version(), b.version()))
            .ok_or_else(not_found)
    }

    async fn by_tag(&self, repo: &str, tag: &str) -> Result<Release, InstallError> {
        let url = format!("{}/repos/{repo}/releases/tags/{tag}", self.api_base_url);
        self.get_json::<GithubRelease>(&url)
            .await?
            .map(Release::from)
            .ok_or_else(|| InstallError::ReleaseNotFound {
                repo: repo.to_string(),
                wanted: format!("tag {tag}"),
            })
    }
}
