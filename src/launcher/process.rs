//! Handle to a running server process.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;

/// Boxed readable stdio stream.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed writable stdio stream.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A running server: its stdio streams and, for real launches, the child.
///
/// Streams can be taken once each; later calls return `None`.
pub struct ServerProcess {
    child: Option<Child>,
    pid: Option<u32>,
    stdin: Option<BoxedWriter>,
    stdout: Option<BoxedReader>,
    stderr: Option<BoxedReader>,
}

impl ServerProcess {
    /// Wrap a spawned child with piped stdio.
    #[must_use]
    pub fn from_child(mut child: Child) -> Self {
        let stdin = child.stdin.take().map(|s| Box::new(s) as BoxedWriter);
        let stdout = child.stdout.take().map(|s| Box::new(s) as BoxedReader);
        let stderr = child.stderr.take().map(|s| Box::new(s) as BoxedReader);
        Self {
            pid: child.id(),
            child: Some(child),
            stdin,
            stdout,
            stderr,
        }
    }

    /// Build a process from arbitrary streams, e.g. in-memory pipes.
    #[must_use]
    pub fn from_streams(
        pid: Option<u32>,
        stdin: BoxedWriter,
        stdout: BoxedReader,
        stderr: Option<BoxedReader>,
    ) -> Self {
        Self {
            child: None,
            pid,
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr,
        }
    }

    pub fn take_stdin(&mut self) -> Option<BoxedWriter> {
        self.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<BoxedReader> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<BoxedReader> {
        self.stderr.take()
    }

    /// Process ID recorded at spawn.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Wait up to `timeout` for the process to exit, then kill it.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting or killing fails.
    pub async fn reap(mut self, timeout: Duration) -> std::io::Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(pid = self.pid, %status, "Server process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(pid = self.pid, "Server process did not exit, killing");
                child.kill().await
            }
        }
    }
}

impl fmt::Debug for ServerProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerProcess")
            .field("pid", &self.pid)
            .field("child", &self.child.is_some())
            .field("stdin", &self.stdin.is_some())
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}
