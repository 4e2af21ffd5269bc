//! Concurrency-limited request queues.
//!
//! Requests wait in one of three lanes until the lane has room, are then
//! written to the server, and stay in the lane's waiting map until the
//! matching response arrives.
//!
//! ```text
//! enqueue ──► pending (FIFO, unbounded) ──drain──► waiting (seq → Request, bounded)
//!                                                     │
//!                           response(Command, Request_seq) ──► dequeue
//! ```

mod collection;
mod lane;
mod request;
mod request_queue;

pub use collection::*;
pub use lane::*;
pub use request::*;
pub use request_queue::*;
