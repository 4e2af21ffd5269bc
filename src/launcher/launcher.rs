//! Spawn strategies: shell-wrapped on Windows, direct or Mono-hosted elsewhere.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{find_mono, mono_args, LaunchError, Platform, ServerProcess};

/// What to launch and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub cwd: PathBuf,
    pub args: Vec<String>,
    pub launch_path: PathBuf,
    pub use_mono: bool,
}

/// A launched server plus the command line actually used.
#[derive(Debug)]
pub struct LaunchResult {
    pub process: ServerProcess,
    pub command: String,
    pub args: Vec<String>,
    pub using_mono: bool,
}

/// Starts server processes.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`LaunchError`] when the process cannot be started.
    async fn launch(&self, request: &LaunchRequest) -> Result<LaunchResult, LaunchError>;
}

/// Launcher that picks the spawn strategy for the host platform.
#[derive(Debug, Clone, Copy)]
pub struct PlatformLauncher {
    platform: Platform,
}

impl PlatformLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            platform: Platform::current(),
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// True when the request must be hosted by Mono on this platform.
    #[must_use]
    pub fn needs_mono(&self, request: &LaunchRequest) -> bool {
        !self.platform.is_windows()
            && (request.use_mono
                || request
                    .launch_path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("exe")))
    }

    #[cfg(windows)]
    fn launch_windows(request: &LaunchRequest) -> Result<LaunchResult, LaunchError> {
        let launch_path = request.launch_path.to_string_lossy();
        let line = super::cmd_command_line(&launch_path, &request.args);
        tracing::debug!(command_line = %line, "Launching through cmd");

        let mut cmd = Command::new("cmd");
        cmd.raw_arg(&line);
        let process = spawn_piped(cmd, &request.cwd, &request.launch_path)?;
        Ok(LaunchResult {
            process,
            command: "cmd".to_string(),
            args: vec![line],
            using_mono: false,
        })
    }

    fn launch_direct(request: &LaunchRequest) -> Result<LaunchResult, LaunchError> {
        let mut cmd = Command::new(&request.launch_path);
        cmd.args(&request.args);
        let process = spawn_piped(cmd, &request.cwd, &request.launch_path)?;
        Ok(LaunchResult {
            process,
            command: request.launch_path.to_string_lossy().into_owned(),
            args: request.args.clone(),
            using_mono: false,
        })
    }

    async fn launch_mono(request: &LaunchRequest) -> Result<LaunchResult, LaunchError> {
        let mono = find_mono().await?;
        let args = mono_args(&request.launch_path, &request.args);

        let mut cmd = Command::new(&mono);
        cmd.args(&args);
        let process = spawn_piped(cmd, &request.cwd, &mono)?;
        Ok(LaunchResult {
            process,
            command: mono.to_string_lossy().into_owned(),
            args,
            using_mono: true,
        })
    }
}

impl Default for PlatformLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Launcher for PlatformLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<LaunchResult, LaunchError> {
        #[cfg(windows)]
        {
            if self.platform.is_windows() {
                return Self::launch_windows(request);
            }
        }

        if self.needs_mono(request) {
            Self::launch_mono(request).await
        } else {
            Self::launch_direct(request)
        }
    }
}

fn spawn_piped(
    mut cmd: Command,
    cwd: &Path,
    program: &Path,
) -> Result<ServerProcess, LaunchError> {
    cmd.current_dir(cwd)
        .kill_on_drop(true)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = cmd
        .spawn()
        .map_err(|e| LaunchError::from_io(program.to_path_buf(), e))?;
    tracing::info!(pid = child.id(), program = %program.display(), "Spawned server process");
    Ok(ServerProcess::from_child(child))
}
