//! Mono detection for macOS/Linux launches.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;

use super::{LaunchError, Version};

/// Oldest Mono able to host the server.
pub const MINIMUM_MONO_VERSION: Version = Version::new(5, 2, 0);

static MONO_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"version (\d+\.\d+\.\d+)").expect("mono version pattern is a valid regex")
});

/// Arguments for hosting the server at `launch_path` under Mono.
#[must_use]
pub fn mono_args(launch_path: &Path, args: &[String]) -> Vec<String> {
    let mut mono_args = Vec::with_capacity(args.len() + 2);
    mono_args.push("--assembly-loader=strict".to_string());
    mono_args.push(launch_path.to_string_lossy().into_owned());
    mono_args.extend(args.iter().cloned());
    mono_args
}

/// Extract the version from `mono --version` output.
#[must_use]
pub fn parse_mono_version(output: &str) -> Option<Version> {
    MONO_VERSION
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Locate `mono` on `PATH` and check it meets [`MINIMUM_MONO_VERSION`].
///
/// # Errors
///
/// Returns [`LaunchError::MonoMissing`] or [`LaunchError::MonoTooOld`] naming
/// the unmet requirement.
pub async fn find_mono() -> Result<PathBuf, LaunchError> {
    let mono = which::which("mono").map_err(|_| LaunchError::MonoMissing {
        required: MINIMUM_MONO_VERSION,
    })?;

    let output = Command::new(&mono)
        .arg("--version")
        .output()
        .await
        .map_err(|e| LaunchError::MonoVersion(e.to_string()))?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let found = parse_mono_version(&stdout)
        .ok_or_else(|| LaunchError::MonoVersion(stdout.lines().next().unwrap_or_default().to_string()))?;

    tracing::debug!(path = %mono.display(), %found, "Found mono");
    check_mono_version(found)?;
    Ok(mono)
}

/// # Errors
///
/// Returns [`LaunchError::MonoTooOld`] when `found` is below the minimum.
pub fn check_mono_version(found: Version) -> Result<(), LaunchError> {
    if found < MINIMUM_MONO_VERSION {
        return Err(LaunchError::MonoTooOld {
            found,
            required: MINIMUM_MONO_VERSION,
        });
    }
    Ok(())
}
