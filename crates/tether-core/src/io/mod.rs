//! Network and filesystem primitives used by the installer.

pub mod checksum;
pub mod download;
pub mod extract;
