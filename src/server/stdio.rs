//! Line-oriented plumbing between the supervisor and the server's stdio.

use std::sync::{Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::protocol::RequestPacket;
use crate::queue::{QueueError, Request, RequestSink};

/// Request sink that serializes packets onto the writer task's channel.
///
/// Detached while no server is running, so sends fail with
/// [`QueueError::Closed`].
#[derive(Debug, Default)]
pub struct StdinSink {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl StdinSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, tx: mpsc::UnboundedSender<String>) {
        *self.tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
    }

    pub fn detach(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}

impl RequestSink for StdinSink {
    fn send(&self, request: &Request) -> Result<(), QueueError> {
        let line = RequestPacket::new(request.seq(), request.command(), request.data().clone())
            .to_line()?;
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(QueueError::Closed)?;
        tx.send(line).map_err(|_| QueueError::Closed)
    }
}

/// Write each received line to `writer`, newline-terminated.
///
/// Returns when the channel closes or a write fails.
pub async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        tracing::trace!(%line, "Write to server");
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            tracing::warn!(error = %e, "Failed to write to server");
            return;
        }
    }
}

/// Call `on_line` for each line of `reader` until EOF.
///
/// Invalid UTF-8 is replaced rather than treated as an error, and a trailing
/// `\r` is stripped.
///
/// # Errors
///
/// Returns the underlying read error.
pub async fn read_lines<R, F>(reader: R, mut on_line: F) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut segments = BufReader::new(reader).split(b'\n');
    while let Some(segment) = segments.next_segment().await? {
        let line = String::from_utf8_lossy(&segment);
        on_line(line.strip_suffix('\r').unwrap_or(&*line));
    }
    Ok(())
}
