use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Environment variable overriding the tether home directory.
pub const HOME_ENV: &str = "TETHER_HOME";

/// Resolve the tether home (`$TETHER_HOME` or `~/.tether`), reading the
/// environment through `env`.
pub fn tether_home_with(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(val) = env(HOME_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".tether"))
}

/// Resolve the tether home from the process environment.
pub fn tether_home() -> Option<PathBuf> {
    tether_home_with(|key| std::env::var(key).ok())
}

/// Default install root: `{home}/bin`
pub fn bin_dir(home: &Path) -> PathBuf {
    home.join("bin")
}

/// Optional configuration file: `{home}/config.toml`
pub fn config_file(home: &Path) -> PathBuf {
    home.join("config.toml")
}
