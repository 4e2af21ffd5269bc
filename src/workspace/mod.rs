//! Workspace scanning for launch targets.

mod error;
mod targets;
mod watcher;

pub use error::*;
pub use targets::*;
pub use watcher::*;
