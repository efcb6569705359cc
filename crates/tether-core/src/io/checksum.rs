//! SHA-256 verification against a release checksum manifest.
//!
//! The manifest is `sha256sum` output: one `<hex-digest>  <filename>` pair per
//! line. A leading `*` on the file name (binary mode) is ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::InstallError;

/// Parse a manifest into `filename -> lowercase hex digest`.
pub fn parse_manifest(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let (Some(digest), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        map.insert(
            name.trim_start_matches('*').to_string(),
            digest.to_ascii_lowercase(),
        );
    }
    map
}

/// Hex SHA-256 of the file at `path`.
pub fn sha256_file(path: &Path) -> Result<String, InstallError> {
    let mut file = File::open(path).map_err(|e| InstallError::fs("open", path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let count = file
            .read(&mut buffer)
            .map_err(|e| InstallError::fs("read", path, e))?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Outcome of checking one archive against a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Match,
    /// The manifest has no line for this file name.
    NotListed,
    Mismatch { expected: String, actual: String },
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Compare the digest of `archive_path` with the manifest entry named
/// `archive_name`.
///
/// A missing entry or a differing digest is a normal negative verdict, not an
/// error. Only failing to read the archive is an error.
pub fn check(
    archive_path: &Path,
    archive_name: &str,
    manifest: &str,
) -> Result<Verdict, InstallError> {
    let entries = parse_manifest(manifest);
    let Some(expected) = entries.get(archive_name) else {
        return Ok(Verdict::NotListed);
    };

    let actual = sha256_file(archive_path)?;
    if actual == *expected {
        Ok(Verdict::Match)
    } else {
        Ok(Verdict::Mismatch {
            expected: expected.clone(),
            actual,
        })
    }
}

/// `true` only when the manifest lists `archive_name` with the archive's digest.
pub fn verify(
    archive_path: &Path,
    archive_name: &str,
    manifest: &str,
) -> Result<bool, InstallError> {
    check(archive_path, archive_name, manifest).map(|v| v.is_match())
}
