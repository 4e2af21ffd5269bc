//! Server lifecycle and traffic events.

mod bus;
mod event;

pub use bus::*;
pub use event::*;
