//! Archive extraction.
//!
//! [`ArchiveExtractor`] picks the archive kind from the file extension,
//! prepares the destination and hands the actual unpacking to an
//! [`ArchiveTool`]. Two tools exist: [`CommandArchiveTool`] shells out to the
//! platform's `tar`/`unzip`/PowerShell, [`NativeArchiveTool`] unpacks
//! in-process.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::InstallError;
use crate::platform::ArchiveKind;

/// Something that can unpack an archive of a given kind into a directory.
#[async_trait]
pub trait ArchiveTool: Send + Sync + fmt::Debug {
    /// Unpack `archive` into `dest`, which already exists.
    async fn unpack(&self, kind: ArchiveKind, archive: &Path, dest: &Path)
    -> Result<(), InstallError>;
}

/// Which [`ArchiveTool`] an installer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveToolKind {
    #[default]
    Command,
    Native,
}

impl ArchiveToolKind {
    pub fn build(self, timeout: Duration) -> Arc<dyn ArchiveTool> {
        match self {
            Self::Command => Arc::new(CommandArchiveTool::new(timeout)),
            Self::Native => Arc::new(NativeArchiveTool),
        }
    }
}

/// Unpacks with external utilities: `tar` for gzip tarballs, `unzip` on POSIX
/// and `Expand-Archive` on Windows for zips.
#[derive(Debug, Clone)]
pub struct CommandArchiveTool {
    timeout: Duration,
}

impl CommandArchiveTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(kind: ArchiveKind, archive: &Path, dest: &Path) -> tokio::process::Command {
        match kind {
            ArchiveKind::TarGz => {
                let mut cmd = tokio::process::Command::new("tar");
                cmd.arg("-xzf").arg(archive).arg("-C").arg(dest);
                cmd
            }
            ArchiveKind::Zip if cfg!(windows) => {
                let mut cmd = tokio::process::Command::new("powershell");
                cmd.args(["-NoProfile", "-NonInteractive", "-Command"])
                    .arg(format!(
                        "Expand-Archive -LiteralPath {} -DestinationPath {} -Force",
                        ps_quote(archive),
                        ps_quote(dest)
                    ));
                cmd
            }
            ArchiveKind::Zip => {
                let mut cmd = tokio::process::Command::new("unzip");
                cmd.arg("-o").arg("-q").arg(archive).arg("-d").arg(dest);
                cmd
            }
        }
    }
}

fn ps_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}

#[async_trait]
impl ArchiveTool for CommandArchiveTool {
    async fn unpack(
        &self,
        kind: ArchiveKind,
        archive: &Path,
        dest: &Path,
    ) -> Result<(), InstallError> {
        let mut cmd = Self::command(kind, archive, dest);
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let failed = |stderr: String| InstallError::Extraction {
            archive: archive.to_path_buf(),
            stderr,
        };

        let child = cmd
            .spawn()
            .map_err(|e| failed(format!("could not start {program}: {e}")))?;

        // Dropping the wait future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(failed(format!("{program} failed: {e}"))),
            Err(_) => {
                return Err(failed(format!(
                    "{program} did not finish within {}s and was killed",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(failed(if stderr.is_empty() {
                format!("{program} exited with {}", output.status)
            } else {
                stderr
            }));
        }
        Ok(())
    }
}

/// Unpacks in-process with the `tar`, `flate2` and `zip` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeArchiveTool;

#[async_trait]
impl ArchiveTool for NativeArchiveTool {
    async fn unpack(
        &self,
        kind: ArchiveKind,
        archive: &Path,
        dest: &Path,
    ) -> Result<(), InstallError> {
        let archive_owned = archive.to_path_buf();
        let dest = dest.to_path_buf();

        let result = tokio::task::spawn_blocking(move || match kind {
            ArchiveKind::TarGz => unpack_tar_gz(&archive_owned, &dest),
            ArchiveKind::Zip => unpack_zip(&archive_owned, &dest),
        })
        .await
        .map_err(io::Error::other)
        .and_then(|r| r);

        result.map_err(|e| InstallError::Extraction {
            archive: archive.to_path_buf(),
            stderr: e.to_string(),
        })
    }
}

/// Reject absolute paths and `..` so entries stay inside the destination.
fn safe_relative(path: &Path) -> io::Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid path in archive: {}", path.display()),
                ));
            }
        }
    }
    Ok(out)
}

fn unpack_tar_gz(archive_path: &Path, dest_dir: &Path) -> io::Result<()> {
    let file = File::open(archive_path)?;
    let reader = flate2::read::GzDecoder::new(BufReader::new(file));
    unpack_tar(reader, dest_dir)
}

fn unpack_tar<R: Read>(reader: R, dest_dir: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            continue;
        }

        let relative = safe_relative(&entry.path()?)?;
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Link entries are not allowed in archive: {}", relative.display()),
            ));
        }
        let absolute = dest_dir.join(&relative);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&absolute)?;
    }
    Ok(())
}

fn unpack_zip(archive_path: &Path, dest_dir: &Path) -> io::Result<()> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(io::Error::other)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(io::Error::other)?;
        let Some(relative) = file.enclosed_name() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid path in archive: {}", file.name()),
            ));
        };
        let absolute = dest_dir.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&absolute)?;
            continue;
        }
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut outfile = File::create(&absolute)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

/// Unpacks release archives and locates the daemon executable inside them.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    tool: Arc<dyn ArchiveTool>,
}

impl ArchiveExtractor {
    pub fn new(tool: Arc<dyn ArchiveTool>) -> Self {
        Self { tool }
    }

    /// Unpack `archive` into `dest_dir` (created if missing) and return the
    /// path of the file named `executable_name` inside it. When several
    /// entries share that name the shallowest wins.
    ///
    /// # Errors
    ///
    /// - `UnsupportedArchiveFormat` if the extension is not `.tar.gz`, `.tgz`
    ///   or `.zip`; nothing is touched on disk in that case.
    /// - `Extraction` if the tool fails or the executable is absent.
    pub async fn extract(
        &self,
        archive: &Path,
        dest_dir: &Path,
        executable_name: &str,
    ) -> Result<PathBuf, InstallError> {
        let kind = ArchiveKind::detect(archive)?;

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| InstallError::fs("create", dest_dir, e))?;

        tracing::debug!(
            "Extracting {} ({kind}) into {}",
            archive.display(),
            dest_dir.display()
        );
        self.tool.unpack(kind, archive, dest_dir).await?;

        find_file(dest_dir, executable_name).ok_or_else(|| InstallError::Extraction {
            archive: archive.to_path_buf(),
            stderr: format!("archive does not contain {executable_name}"),
        })
    }
}

fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == name)
        .min_by_key(walkdir::DirEntry::depth)
        .map(walkdir::DirEntry::into_path)
}
