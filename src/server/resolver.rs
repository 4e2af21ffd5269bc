//! Locating the server executable.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::ResolveError;
use crate::config::ServerOptions;
use crate::launcher::{Platform, Version};

/// Version string selecting the newest installed server.
pub const LATEST_VERSION: &str = "latest";

/// Maps a version (or `"latest"`) to an executable path.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`ResolveError`] when no executable exists for `version`.
    async fn resolve(&self, version: &str) -> Result<PathBuf, ResolveError>;
}

/// Resolver over `<install_root>/<version>/<executable>`.
#[derive(Debug, Clone)]
pub struct InstalledVersionResolver {
    install_root: PathBuf,
    platform: Platform,
}

impl InstalledVersionResolver {
    #[must_use]
    pub fn new(install_root: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            install_root: install_root.into(),
            platform,
        }
    }

    #[must_use]
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Highest version directory under the install root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be read or holds no versions.
    pub async fn latest_installed(&self) -> Result<String, ResolveError> {
        let io_error = |source| ResolveError::Io {
            path: self.install_root.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.install_root)
            .await
            .map_err(io_error)?;

        let mut latest: Option<(Version, String)> = None;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(version) = name.parse::<Version>() else {
                continue;
            };
            if latest.as_ref().is_none_or(|(best, _)| version > *best) {
                latest = Some((version, name));
            }
        }

        latest
            .map(|(_, name)| name)
            .ok_or_else(|| ResolveError::NoVersions(self.install_root.clone()))
    }
}

#[async_trait]
impl VersionResolver for InstalledVersionResolver {
    async fn resolve(&self, version: &str) -> Result<PathBuf, ResolveError> {
        let version = if version == LATEST_VERSION {
            self.latest_installed().await?
        } else {
            version.to_string()
        };
        let path = self
            .install_root
            .join(&version)
            .join(self.platform.server_executable());

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(%version, path = %path.display(), "Resolved server version");
            Ok(path)
        } else {
            Err(ResolveError::NotInstalled { version, path })
        }
    }
}

/// Pick the executable for `options`.
///
/// An absolute `path` is used verbatim, any other `path` is a version handed
/// to `resolver`, and no `path` means the bundled executable.
///
/// # Errors
///
/// Returns the resolver's error for an unknown version.
pub async fn resolve_launch_path(
    options: &ServerOptions,
    resolver: &dyn VersionResolver,
    platform: Platform,
) -> Result<PathBuf, ResolveError> {
    match options.path.as_deref() {
        Some(path) if Path::new(path).is_absolute() => Ok(PathBuf::from(path)),
        Some(version) => resolver.resolve(version).await,
        None => Ok(options.bundled_path(platform)),
    }
}
