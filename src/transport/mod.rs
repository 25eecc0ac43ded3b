//! Transport module - TCP sockets on both sides of the multiplexer.
//!
//! Provides:
//! - [`bind_listener`] for the listening role, with a bounded accept backlog
//! - [`connect_target`] for the connector role
//! - [`Connection`], an owned write half plus a reader task that turns
//!   socket reads into [`ConnEvent`]s for the reactor

mod connection;
mod tcp;

pub use connection::{ConnEvent, Connection, DEFAULT_CHUNK_SIZE};
pub use tcp::{bind_listener, connect_target, format_peer, resolve, DEFAULT_ACCEPT_BACKLOG};
