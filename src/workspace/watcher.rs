//! One-shot wait for a project file to appear.

use std::path::{Path, PathBuf};

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::{DiscoveryError, ProjectFileMatcher};

/// Watch `root` recursively and return the first created project file.
///
/// The watcher is dropped as soon as a match is seen.
///
/// # Errors
///
/// Returns an error if the watcher cannot be installed or stops early.
pub async fn wait_for_project_file(root: &Path) -> Result<PathBuf, DiscoveryError> {
    let root = root
        .canonicalize()
        .map_err(|_| DiscoveryError::NotADirectory(root.to_path_buf()))?;
    let matcher = ProjectFileMatcher::new()?;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        // The receiver is gone once a match was returned.
        let _ = tx.send(res);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    tracing::info!(root = %root.display(), "Waiting for a project file");

    while let Some(res) = rx.recv().await {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Workspace watcher error");
                continue;
            }
        };
        if !matches!(event.kind, EventKind::Create(_)) {
            continue;
        }
        for path in event.paths {
            let relative = path.strip_prefix(&root).unwrap_or(&path);
            if matcher.is_match(relative) {
                tracing::info!(path = %path.display(), "Project file created");
                return Ok(path);
            }
        }
    }

    Err(DiscoveryError::WatcherClosed)
}
