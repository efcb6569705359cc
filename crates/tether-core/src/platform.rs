//! Host platform detection.
//!
//! Maps the running OS/CPU pair to the target triple used in release asset
//! names, and to the archive format published for that triple.

use std::fmt;
use std::path::Path;

use crate::error::InstallError;

/// Archive formats published for daemon releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    TarGz,
    Zip,
}

impl ArchiveKind {
    /// Extension used when naming release assets.
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }

    /// Detect the archive kind from a file name. `.tar.gz`, `.tgz` and `.zip`
    /// are recognised, case-insensitively; anything else is rejected.
    pub fn detect(path: &Path) -> Result<Self, InstallError> {
        let name = path.to_string_lossy().to_lowercase();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if name.ends_with(".zip") {
            Ok(Self::Zip)
        } else {
            Err(InstallError::UnsupportedArchiveFormat {
                path: path.to_path_buf(),
            })
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Release target for one OS/architecture pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformTarget {
    pub triple: String,
    pub archive: ArchiveKind,
}

impl PlatformTarget {
    pub fn new(triple: impl Into<String>, archive: ArchiveKind) -> Self {
        Self {
            triple: triple.into(),
            archive,
        }
    }

    /// Resolve the target for the running host.
    pub fn current() -> Result<Self, InstallError> {
        Self::for_host(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Resolve the target for an OS/arch pair, spelled as in `std::env::consts`.
    pub fn for_host(os: &str, arch: &str) -> Result<Self, InstallError> {
        let (triple, archive) = match (os, arch) {
            ("linux", "x86_64") => ("x86_64-unknown-linux-gnu", ArchiveKind::TarGz),
            ("linux", "aarch64") => ("aarch64-unknown-linux-gnu", ArchiveKind::TarGz),
            ("macos", "x86_64") => ("x86_64-apple-darwin", ArchiveKind::TarGz),
            ("macos", "aarch64") => ("aarch64-apple-darwin", ArchiveKind::TarGz),
            ("windows", "x86_64") => ("x86_64-pc-windows-msvc", ArchiveKind::Zip),
            ("windows", "aarch64") => ("aarch64-pc-windows-msvc", ArchiveKind::Zip),
            _ => {
                return Err(InstallError::UnsupportedPlatform {
                    os: os.to_string(),
                    arch: arch.to_string(),
                });
            }
        };
        Ok(Self::new(triple, archive))
    }

    pub fn is_windows(&self) -> bool {
        self.triple.contains("windows")
    }

    /// File name of the executable for this target (`tetherd` or `tetherd.exe`).
    pub fn executable_name(&self, binary_name: &str) -> String {
        if self.is_windows() {
            format!("{binary_name}.exe")
        } else {
            binary_name.to_string()
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.triple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_known_hosts() {
        let cases = [
            ("linux", "x86_64", "x86_64-unknown-linux-gnu", ArchiveKind::TarGz),
            ("linux", "aarch64", "aarch64-unknown-linux-gnu", ArchiveKind::TarGz),
            ("macos", "x86_64", "x86_64-apple-darwin", ArchiveKind::TarGz),
            ("macos", "aarch64", "aarch64-apple-darwin", ArchiveKind::TarGz),
            ("windows", "x86_64", "x86_64-pc-windows-msvc", ArchiveKind::Zip),
            ("windows", "aarch64", "aarch64-pc-windows-msvc", ArchiveKind::Zip),
        ];
        for (os, arch, triple, archive) in cases {
            let target = PlatformTarget::for_host(os, arch).unwrap();
            assert_eq!(target.triple, triple);
            assert_eq!(target.archive, archive);
        }
    }

    #[test]
    fn test_unsupported_host() {
        let err = PlatformTarget::for_host("freebsd", "x86_64").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
        assert!(err.to_string().contains("freebsd-x86_64"));

        let err = PlatformTarget::for_host("linux", "riscv64").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
    }

    #[test]
    fn test_executable_name() {
        let win = PlatformTarget::for_host("windows", "x86_64").unwrap();
        assert_eq!(win.executable_name("tetherd"), "tetherd.exe");

        let linux = PlatformTarget::for_host("linux", "x86_64").unwrap();
        assert_eq!(linux.executable_name("tetherd"), "tetherd");
    }

    #[test]
    fn test_detect_archive_kind() {
        assert_eq!(
            ArchiveKind::detect(Path::new("a-v1-x.tar.gz")).unwrap(),
            ArchiveKind::TarGz
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("A.TGZ")).unwrap(),
            ArchiveKind::TarGz
        );
        assert_eq!(
            ArchiveKind::detect(Path::new("a.zip")).unwrap(),
            ArchiveKind::Zip
        );

        let err = ArchiveKind::detect(Path::new("daemon.rar")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedArchiveFormat);
        assert!(err.to_string().contains("daemon.rar"));
    }
}
