//! Release asset selection.
//!
//! Assets follow a fixed naming convention:
//! `{binary}-{tag}-{triple}.{ext}`, e.g.
//! `tetherd-v1.2.3-aarch64-apple-darwin.tar.gz`.

use crate::error::InstallError;
use crate::platform::PlatformTarget;
use crate::release::{Asset, Release};

/// Expected asset file name for a release and target.
pub fn expected_asset_name(binary_name: &str, tag: &str, target: &PlatformTarget) -> String {
    format!(
        "{binary_name}-{tag}-{}.{}",
        target.triple,
        target.archive.extension()
    )
}

/// Pick the asset built for `target`. Only an exact name match counts.
///
/// # Errors
///
/// `AssetNotFound`, listing the assets the release does have.
pub fn select_asset<'a>(
    release: &'a Release,
    target: &PlatformTarget,
    binary_name: &str,
) -> Result<&'a Asset, InstallError> {
    let expected = expected_asset_name(binary_name, &release.tag, target);
    release
        .asset(&expected)
        .ok_or_else(|| InstallError::AssetNotFound {
            expected,
            tag: release.tag.clone(),
            available: release.asset_names(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::platform::ArchiveKind;

    fn release(names: &[&str]) -> Release {
        Release {
            tag: "v1.2.3".to_string(),
            prerelease: false,
            assets: names
                .iter()
                .map(|n| Asset {
                    name: (*n).to_string(),
                    download_url: format!("https://dl.example.com/{n}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_expected_name() {
        let target = PlatformTarget::new("x86_64-pc-windows-msvc", ArchiveKind::Zip);
        assert_eq!(
            expected_asset_name("tetherd", "v1.2.3", &target),
            "tetherd-v1.2.3-x86_64-pc-windows-msvc.zip"
        );
    }

    #[test]
    fn test_selects_exact_match() {
        let target = PlatformTarget::new("aarch64-apple-darwin", ArchiveKind::TarGz);
        let rel = release(&[
            "tetherd-v1.2.3-x86_64-apple-darwin.tar.gz",
            "tetherd-v1.2.3-aarch64-apple-darwin.tar.gz",
            "checksums.txt",
        ]);
        let asset = select_asset(&rel, &target, "tetherd").unwrap();
        assert_eq!(asset.name, "tetherd-v1.2.3-aarch64-apple-darwin.tar.gz");
    }

    #[test]
    fn test_near_miss_is_not_selected() {
        let target = PlatformTarget::new("aarch64-apple-darwin", ArchiveKind::TarGz);
        let rel = release(&[
            "tetherd-v1.2.3-aarch64-apple-darwin.zip",
            "tetherd-1.2.3-aarch64-apple-darwin.tar.gz",
        ]);
        let err = select_asset(&rel, &target, "tetherd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AssetNotFound);
        let msg = err.to_string();
        assert!(msg.contains("tetherd-v1.2.3-aarch64-apple-darwin.tar.gz"));
        assert!(msg.contains("tetherd-v1.2.3-aarch64-apple-darwin.zip"));
    }
}
