//! Discovery error types.

use std::path::PathBuf;

/// Errors that can occur while scanning or watching a workspace.
#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    /// The workspace root is not a directory.
    #[error("Workspace is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A project glob failed to compile.
    #[error("Invalid project pattern: {0}")]
    Glob(#[from] globset::Error),

    /// Directory traversal failed.
    #[error("Failed to scan workspace: {0}")]
    Walk(#[from] walkdir::Error),

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The watcher stopped before a project file appeared.
    #[error("Workspace watcher closed")]
    WatcherClosed,
}
