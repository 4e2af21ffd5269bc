//! Lane classification.

use std::fmt;

use crate::protocol::commands::{DEFERRED_COMMANDS, PRIORITY_COMMANDS};

/// Minimum in-flight capacity of the deferred lane.
pub const MIN_DEFERRED_CAPACITY: usize = 2;

/// One of the three request lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Priority,
    Normal,
    Deferred,
}

impl Lane {
    /// All lanes in drain order.
    pub const ALL: [Lane; 3] = [Lane::Priority, Lane::Normal, Lane::Deferred];

    /// Pick the lane for a command name.
    #[must_use]
    pub fn for_command(command: &str) -> Self {
        if PRIORITY_COMMANDS.contains(&command) {
            Self::Priority
        } else if DEFERRED_COMMANDS.contains(&command) {
            Self::Deferred
        } else {
            Self::Normal
        }
    }

    /// Maximum number of in-flight requests for this lane.
    #[must_use]
    pub fn capacity(self, concurrency: usize) -> usize {
        match self {
            Self::Priority => 1,
            Self::Normal => concurrency.max(1),
            Self::Deferred => (concurrency / 4).max(MIN_DEFERRED_CAPACITY),
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Priority => "Priority",
            Self::Normal => "Normal",
            Self::Deferred => "Deferred",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
