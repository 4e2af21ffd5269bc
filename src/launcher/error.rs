//! Launch errors.

use std::path::PathBuf;

use super::Version;

/// Error type for launching the server process.
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    /// The server executable does not exist.
    #[error("Server executable not found: {0}")]
    NotFound(PathBuf),
    /// The executable exists but may not be run.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    /// Mono is required and not on `PATH`.
    #[error("Cannot start OmniSharp because Mono version >={required} is required.")]
    MonoMissing { required: Version },
    /// Mono is installed but older than required.
    #[error("Cannot start OmniSharp because Mono version >={required} is required. Found {found}.")]
    MonoTooOld { found: Version, required: Version },
    /// `mono --version` could not be run or understood.
    #[error("Failed to determine Mono version: {0}")]
    MonoVersion(String),
    /// Other spawn failure.
    #[error("Failed to spawn server: {0}")]
    Spawn(#[source] std::io::Error),
}

impl LaunchError {
    /// Classify a spawn failure for `path`.
    pub(crate) fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Spawn(err),
        }
    }
}
