//! Terminating the server together with the processes it spawned.

use async_trait::async_trait;

/// Capability to terminate a process and its children.
#[async_trait]
pub trait ProcessTree: Send + Sync {
    /// Terminate `pid` and its children.
    ///
    /// # Errors
    ///
    /// Returns an error if the termination request could not be issued.
    async fn terminate(&self, pid: u32) -> std::io::Result<()>;
}

/// Process tree backed by the operating system.
///
/// Windows kills the whole tree with `taskkill /F /T`. Unix sends SIGTERM to
/// each direct child before the server itself so none are orphaned.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessTree;

#[async_trait]
impl ProcessTree for SystemProcessTree {
    #[cfg(windows)]
    async fn terminate(&self, pid: u32) -> std::io::Result<()> {
        let status = tokio::process::Command::new("taskkill")
            .args(["/F", "/T", "/PID", &pid.to_string()])
            .status()
            .await?;
        if !status.success() {
            tracing::debug!(pid, %status, "taskkill reported failure");
        }
        Ok(())
    }

    #[cfg(unix)]
    async fn terminate(&self, pid: u32) -> std::io::Result<()> {
        let children = tokio::task::spawn_blocking(move || child_pids(pid))
            .await
            .map_err(std::io::Error::other)?;

        for child in children {
            tracing::debug!(pid = child, parent = pid, "Terminating child process");
            // The child may already have exited.
            let _ = sigterm(child);
        }
        sigterm(pid)
    }
}

/// Direct children of `pid`.
#[cfg(unix)]
#[must_use]
pub fn child_pids(pid: u32) -> Vec<u32> {
    use sysinfo::{Pid, ProcessesToUpdate, System};

    let parent = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
        .processes()
        .values()
        .filter(|process| process.thread_kind().is_none() && process.parent() == Some(parent))
        .map(|process| process.pid().as_u32())
        .collect()
}

#[cfg(unix)]
fn sigterm(pid: u32) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(std::io::Error::other)?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(std::io::Error::from)
}
