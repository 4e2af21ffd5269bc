//! Request latency telemetry.

mod delay;

pub use delay::*;
