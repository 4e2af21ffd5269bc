//! Server lifecycle state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the supervised server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Started,
}

/// Tracks the state and rejects transitions outside
/// `Stopped -> Starting -> Started -> Stopped`.
#[derive(Debug, Clone, Default)]
pub struct ServerStateMachine {
    state: ServerState,
}

impl ServerStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Whether `to` is reachable from the current state.
    ///
    /// Any state may fall back to `Stopped`.
    #[must_use]
    pub fn can_transition(&self, to: ServerState) -> bool {
        matches!(
            (self.state, to),
            (ServerState::Stopped, ServerState::Starting)
                | (ServerState::Starting, ServerState::Started)
                | (ServerState::Starting | ServerState::Started, ServerState::Stopped)
        )
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns the rejected pair when the transition is not allowed.
    pub fn transition(&mut self, to: ServerState) -> Result<(), InvalidTransition> {
        if !self.can_transition(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!(from = ?self.state, to = ?to, "State transition");
        self.state = to;
        Ok(())
    }
}

/// A transition the state machine refused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid state transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: ServerState,
    pub to: ServerState,
}
