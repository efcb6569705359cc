//! Asks an installed daemon binary for its version.

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// Run `{path} --version` and pull the first version token out of stdout.
///
/// Returns `None` when the file is missing, cannot be started, runs past
/// `timeout`, exits non-zero or prints nothing that looks like a version.
pub async fn probe_installed_version(path: &Path, timeout: Duration) -> Option<String> {
    if !path.is_file() {
        return None;
    }

    let child = tokio::process::Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .inspect_err(|e| tracing::debug!("Could not run {}: {e}", path.display()))
        .ok()?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::debug!("Version probe of {} failed: {e}", path.display());
            return None;
        }
        Err(_) => {
            tracing::debug!("Version probe of {} timed out", path.display());
            return None;
        }
    };

    if !output.status.success() {
        tracing::debug!(
            "{} --version exited with {}",
            path.display(),
            output.status
        );
        return None;
    }
    parse_version_output(&String::from_utf8_lossy(&output.stdout))
}

static VERSION_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"v?(\d+\.\d+\.\d+(?:-[A-Za-z]+(?:\.\d+)?)?)").ok());

/// First `MAJOR.MINOR.PATCH(-TAG(.NUM)?)?` token in `text`, without a leading `v`.
pub fn parse_version_output(text: &str) -> Option<String> {
    VERSION_TOKEN
        .as_ref()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
