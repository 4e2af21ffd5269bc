//! A single lane: pending list plus bounded waiting map.

use std::collections::{HashMap, VecDeque};

use super::{Lane, Request, RequestError};

/// Error returned by a [`RequestSink`] that could not write a request.
#[derive(thiserror::Error, Debug)]
pub enum QueueError {
    /// The server's input stream is gone.
    #[error("Server input is closed")]
    Closed,
    /// The request could not be encoded.
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for dispatched requests, normally the server's stdin.
pub trait RequestSink: Send + Sync {
    /// Write the request to the server.
    ///
    /// # Errors
    ///
    /// Returns a [`QueueError`] if the request cannot be written.
    fn send(&self, request: &Request) -> Result<(), QueueError>;
}

/// One lane of the request queue.
#[derive(Debug)]
pub struct RequestQueue {
    lane: Lane,
    max_size: usize,
    pending: VecDeque<Request>,
    waiting: HashMap<u64, Request>,
}

impl RequestQueue {
    #[must_use]
    pub fn new(lane: Lane, max_size: usize) -> Self {
        Self {
            lane,
            max_size: max_size.max(1),
            pending: VecDeque::new(),
            waiting: HashMap::new(),
        }
    }

    #[must_use]
    pub fn lane(&self) -> Lane {
        self.lane
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.waiting.len() >= self.max_size
    }

    /// Append to the pending list. Never rejects.
    pub fn enqueue(&mut self, request: Request) {
        tracing::debug!(lane = %self.lane, command = request.command(), seq = request.seq(), "Enqueue request");
        self.pending.push_back(request);
    }

    /// Remove a request from the waiting map.
    pub fn dequeue(&mut self, seq: u64) -> Option<Request> {
        let request = self.waiting.remove(&seq)?;
        tracing::debug!(
            lane = %self.lane,
            command = request.command(),
            seq,
            elapsed_ms = request.in_flight().map(|d| d.as_millis()),
            "Dequeue request"
        );
        Some(request)
    }

    /// Cancel a request that has not been sent yet.
    ///
    /// Rejects it with [`RequestError::Cancelled`] and returns true. A request
    /// already in the waiting map is left alone and false is returned.
    pub fn cancel(&mut self, seq: u64) -> bool {
        let Some(index) = self.pending.iter().position(|r| r.seq() == seq) else {
            return false;
        };
        let Some(request) = self.pending.remove(index) else {
            return false;
        };
        let command = request.command().to_string();
        tracing::debug!(lane = %self.lane, %command, seq, "Cancelled pending request");
        request.reject(RequestError::Cancelled(command));
        true
    }

    /// Move pending requests into the waiting map until the lane is full.
    pub fn process_pending(&mut self, sink: &dyn RequestSink) {
        if self.pending.is_empty() {
            return;
        }
        tracing::trace!(lane = %self.lane, pending = self.pending.len(), "Processing pending requests");

        while !self.is_full() {
            let Some(mut request) = self.pending.pop_front() else {
                break;
            };
            request.mark_dispatched();
            match sink.send(&request) {
                Ok(()) => {
                    self.waiting.insert(request.seq(), request);
                }
                Err(e) => {
                    tracing::warn!(lane = %self.lane, command = request.command(), error = %e, "Failed to send request");
                    let command = request.command().to_string();
                    request.reject(RequestError::Send {
                        command,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::trace!(lane = %self.lane, waiting = self.waiting.len(), "Processing complete");
    }

    /// Reject every pending and waiting request with [`RequestError::ServerStopped`].
    pub fn abandon(&mut self) {
        let pending = self.pending.drain(..);
        let waiting = self.waiting.drain().map(|(_, request)| request);
        for request in pending.chain(waiting) {
            let command = request.command().to_string();
            request.reject(RequestError::ServerStopped(command));
        }
    }
}
