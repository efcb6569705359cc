//! tether-core - install and update the tether daemon
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Fetches a published `tetherd` release for the running platform, verifies
//! it against the release's sha256 manifest and swaps it into place.
//!
//! # Layout
//!
//! ```text
//! ~/.tether/
//! ├── config.toml      # Optional [installer] overrides
//! └── bin/
//!     └── tetherd      # Canonical daemon binary
//! ```
//!
//! During an install the `bin/` directory also briefly holds the downloaded
//! archive, a staging directory and a `.tetherd.lock` file.

pub mod asset;
pub mod config;
pub mod error;
pub mod installer;
pub mod io;
pub mod paths;
pub mod platform;
pub mod release;
pub mod version;

pub use config::{ConfigError, InstallerConfig};
pub use error::{ErrorKind, InstallError};
pub use installer::{InstallOptions, InstallResult, Installer, InstallerBuilder};
pub use io::download::{Progress, ProgressFn};
pub use platform::{ArchiveKind, PlatformTarget};
pub use release::{Asset, GitHubReleases, Release, ReleaseSource};

/// User Agent string for release and download requests
pub const USER_AGENT: &str = concat!("tether/", env!("CARGO_PKG_VERSION"));
