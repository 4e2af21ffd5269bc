//! A single queued request and its completion handle.

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::oneshot;

/// Final result delivered to the caller of a request.
pub type RequestOutcome = Result<Value, RequestError>;

/// Errors surfaced to request callers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The server is not in the started state.
    #[error("server has been stopped or not started")]
    NotStarted,
    /// Cancelled while still pending.
    #[error("Pending request cancelled: {0}")]
    Cancelled(String),
    /// The server answered with `Success: false`.
    #[error("{0}")]
    Failed(String),
    /// The request could not be written to the server.
    #[error("Failed to send {command}: {reason}")]
    Send { command: String, reason: String },
    /// The server was stopped before it answered.
    #[error("Server stopped before responding to {0}")]
    ServerStopped(String),
    /// Arguments could not be serialized.
    #[error("Invalid arguments for {command}: {reason}")]
    Encode { command: String, reason: String },
    /// The response body did not match the expected shape.
    #[error("Unexpected response body for {command}: {reason}")]
    Decode { command: String, reason: String },
}

/// A request travelling through the queues.
///
/// The completion handle is consumed by [`Request::resolve`] or
/// [`Request::reject`]; a request dropped without either makes the caller
/// observe a closed channel.
#[derive(Debug)]
pub struct Request {
    seq: u64,
    command: String,
    data: Value,
    dispatched_at: Option<Instant>,
    responder: oneshot::Sender<RequestOutcome>,
}

impl Request {
    /// Create a request and the receiver its outcome will arrive on.
    #[must_use]
    pub fn new(
        seq: u64,
        command: impl Into<String>,
        data: Value,
    ) -> (Self, oneshot::Receiver<RequestOutcome>) {
        let (responder, rx) = oneshot::channel();
        let request = Self {
            seq,
            command: command.into(),
            data,
            dispatched_at: None,
            responder,
        };
        (request, rx)
    }

    /// Correlation id.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub(crate) fn mark_dispatched(&mut self) {
        self.dispatched_at = Some(Instant::now());
    }

    /// Time since the request was written to the server.
    #[must_use]
    pub fn in_flight(&self) -> Option<Duration> {
        self.dispatched_at.map(|at| at.elapsed())
    }

    pub fn resolve(self, body: Value) {
        self.complete(Ok(body));
    }

    pub fn reject(self, error: RequestError) {
        self.complete(Err(error));
    }

    fn complete(self, outcome: RequestOutcome) {
        // The caller may have stopped waiting; nothing else to notify.
        let _ = self.responder.send(outcome);
    }
}
