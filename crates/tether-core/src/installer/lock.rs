//! Advisory lock serialising installs into one install root.
//!
//! The lock is a file created with `create_new`, holding the owner's pid.
//! It is removed when the guard drops. A lock older than the configured age
//! is assumed to belong to a crashed run and is replaced.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::InstallError;

#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
}

impl InstallLock {
    /// Lock file for `binary_name` inside `install_root`.
    pub fn path_for(install_root: &Path, binary_name: &str) -> PathBuf {
        install_root.join(format!(".{binary_name}.lock"))
    }

    /// Take the lock at `path`.
    ///
    /// # Errors
    ///
    /// `InstallInProgress` if a lock younger than `stale_after` exists.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<Self, InstallError> {
        match create(path) {
            Ok(()) => return Ok(Self::held(path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(InstallError::fs("create", path, e)),
        }

        if !is_stale(path, stale_after) {
            return Err(InstallError::InstallInProgress {
                lock: path.to_path_buf(),
            });
        }

        tracing::warn!("Replacing stale install lock {}", path.display());
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(InstallError::fs("remove", path, e)),
        }

        match create(path) {
            Ok(()) => Ok(Self::held(path)),
            // Another process won the race for the stale lock.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(InstallError::InstallInProgress {
                    lock: path.to_path_buf(),
                })
            }
            Err(e) => Err(InstallError::fs("create", path, e)),
        }
    }

    fn held(path: &Path) -> Self {
        tracing::debug!("Acquired install lock {}", path.display());
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!("Could not remove install lock {}: {e}", self.path.display());
        }
    }
}

fn create(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(file, "{}", std::process::id())
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta
            .modified()
            .ok()
            .and_then(|t| t.elapsed().ok())
            .is_some_and(|age| age >= stale_after),
        // Released between our create attempt and now.
        Err(e) => e.kind() == io::ErrorKind::NotFound,
    }
}
