//! Supervisor error types.

use std::path::PathBuf;

use super::{InvalidTransition, ServerState};
use crate::launcher::LaunchError;
use crate::workspace::DiscoveryError;

/// Errors resolving the server executable.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    /// The requested version has no executable under the install root.
    #[error("OmniSharp {version} is not installed (expected {path})")]
    NotInstalled { version: String, path: PathBuf },

    /// `latest` was requested but nothing is installed.
    #[error("No OmniSharp versions installed in {0}")]
    NoVersions(PathBuf),

    /// The install root could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors from starting, restarting or selecting a server.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// `start` was called while a server is starting or running.
    #[error("Server is already {0:?}")]
    AlreadyRunning(ServerState),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The server did not report `started` in time.
    #[error(
        "OmniSharp server load timed out after {secs}s. Use the 'project_load_timeout' setting to override the default delay."
    )]
    ProjectLoadTimeout { secs: u64 },

    /// `stop` was called while the server was still starting.
    #[error("Server was stopped while starting")]
    StoppedWhileStarting,

    /// The launched process has no usable stdio.
    #[error("Server process has no {0}")]
    MissingStream(&'static str),

    /// `restart` was called before any target was chosen.
    #[error("No launch target selected")]
    NoLaunchTarget,

    /// A blocking workspace scan panicked or was cancelled.
    #[error("Workspace scan failed: {0}")]
    Join(String),
}
