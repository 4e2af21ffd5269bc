//! OmniSharp Supervisor - launch and drive an OmniSharp server over stdio.

pub mod config;
pub mod display;
pub mod events;
pub mod launcher;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod telemetry;
pub mod workspace;
