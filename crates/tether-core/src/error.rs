//! Error taxonomy for the daemon installer.
//!
//! Every failure of the install pipeline maps onto exactly one [`InstallError`]
//! variant. Variants carry enough context to be shown to an operator as-is.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Unsupported platform: {os}-{arch} has no published daemon build")]
    UnsupportedPlatform { os: String, arch: String },

    #[error(
        "Daemon is already installed at {}. Re-run with --force to reinstall",
        .path.display()
    )]
    AlreadyInstalled { path: PathBuf },

    #[error("No release found for {repo}: {wanted}")]
    ReleaseNotFound { repo: String, wanted: String },

    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error(
        "No asset named {expected} in release {tag}. Available assets: {}",
        display_list(.available)
    )]
    AssetNotFound {
        expected: String,
        tag: String,
        available: Vec<String>,
    },

    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Checksum verification failed for {asset}: {reason}")]
    ChecksumMismatch { asset: String, reason: String },

    #[error("Unsupported archive format: {}", .path.display())]
    UnsupportedArchiveFormat { path: PathBuf },

    #[error("Extraction of {} failed: {stderr}", .archive.display())]
    Extraction { archive: PathBuf, stderr: String },

    #[error("Permission denied while trying to {action} {}: {source}", .path.display())]
    Permission {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "Another install is in progress (lock held at {}). Retry once it finishes",
        .lock.display()
    )]
    InstallInProgress { lock: PathBuf },

    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fieldless discriminant of [`InstallError`], for callers that only branch on cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedPlatform,
    AlreadyInstalled,
    ReleaseNotFound,
    Network,
    AssetNotFound,
    Download,
    ChecksumMismatch,
    UnsupportedArchiveFormat,
    Extraction,
    Permission,
    InstallInProgress,
    Io,
}

impl InstallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedPlatform { .. } => ErrorKind::UnsupportedPlatform,
            Self::AlreadyInstalled { .. } => ErrorKind::AlreadyInstalled,
            Self::ReleaseNotFound { .. } => ErrorKind::ReleaseNotFound,
            Self::Network { .. } => ErrorKind::Network,
            Self::AssetNotFound { .. } => ErrorKind::AssetNotFound,
            Self::Download { .. } => ErrorKind::Download,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::UnsupportedArchiveFormat { .. } => ErrorKind::UnsupportedArchiveFormat,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::InstallInProgress { .. } => ErrorKind::InstallInProgress,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Wrap a local filesystem error, promoting `PermissionDenied` to
    /// [`InstallError::Permission`].
    pub fn fs(action: &'static str, path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::Permission {
                action,
                path,
                source,
            }
        } else {
            Self::Io {
                action,
                path,
                source,
            }
        }
    }

    pub(crate) fn network(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn download(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Download {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_promoted() {
        let err = InstallError::fs(
            "rename",
            Path::new("/opt/bin/tetherd"),
            io::Error::new(io::ErrorKind::PermissionDenied, "nope"),
        );
        assert_eq!(err.kind(), ErrorKind::Permission);

        let err = InstallError::fs(
            "rename",
            Path::new("/opt/bin/tetherd"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_asset_not_found_lists_available_assets() {
        let err = InstallError::AssetNotFound {
            expected: "tetherd-v1.0.0-x86_64-unknown-linux-gnu.tar.gz".to_string(),
            tag: "v1.0.0".to_string(),
            available: vec!["checksums.txt".to_string(), "tetherd-v1.0.0-foo.zip".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("tetherd-v1.0.0-x86_64-unknown-linux-gnu.tar.gz"));
        assert!(msg.contains("checksums.txt, tetherd-v1.0.0-foo.zip"));
    }

    #[test]
    fn test_already_installed_mentions_force() {
        let err = InstallError::AlreadyInstalled {
            path: PathBuf::from("/home/me/.tether/bin/tetherd"),
        };
        assert!(err.to_string().contains("--force"));
    }
}
