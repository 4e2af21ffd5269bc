//! Wire protocol spoken with the server over stdio.
//!
//! Every packet is a single line of UTF-8 JSON. The client writes
//! [`RequestPacket`]s to the server's stdin; the server answers on stdout
//! with response and event packets, which [`parse_packet`] turns into a
//! [`Packet`] or a [`ParseError`].

pub mod commands;
mod log;
mod packet;

pub use log::*;
pub use packet::*;
