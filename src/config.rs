//! Multiplexer configuration.
//!
//! [`MuxConfig`] holds everything the reactor needs. It is usually built
//! through [`MuxBuilder`](crate::MuxBuilder), which validates it.

use crate::control::DEFAULT_LINE_CAPACITY;
use crate::error::{MuxError, Result};
use crate::transport::{DEFAULT_ACCEPT_BACKLOG, DEFAULT_CHUNK_SIZE};

/// Default capacity of the channel from connection reader tasks to the reactor.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Which side of the tunnel this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accept inbound TCP connections and announce them.
    Listen,
    /// Only open outbound connections when the peer announces one.
    Connect,
}

impl Role {
    /// Map the command-line role argument: `"server"` listens, anything else connects.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "server" {
            Role::Listen
        } else {
            Role::Connect
        }
    }

    /// Check if this role owns a listener socket.
    pub fn is_listening(&self) -> bool {
        matches!(self, Role::Listen)
    }
}

/// How queued data frames are written to their sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// One full write inside the reactor. A slow peer stalls every connection.
    Blocking,
    /// One non-blocking write attempt; the unwritten remainder goes back to
    /// the front of the queue until the socket is writable again.
    NonBlocking,
}

/// What to do with a control-channel line that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// End the session.
    Fatal,
    /// Log the line and keep going.
    SkipAndLog,
}

/// Configuration for a multiplexer instance.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Bind host (listening role) or target host (connector role).
    pub host: String,
    /// Bind port (listening role) or target port (connector role).
    pub port: u16,
    /// Role of this endpoint.
    pub role: Role,
    /// Accept backlog for the listener.
    pub accept_backlog: u32,
    /// Maximum bytes read from a connection per event.
    pub chunk_size: usize,
    /// Socket write strategy.
    pub write_mode: WriteMode,
    /// Handling of undecodable control-channel lines.
    pub malformed_policy: MalformedPolicy,
    /// Capacity of the connection event channel.
    pub event_capacity: usize,
    /// Capacity of the control-channel line channel.
    pub line_capacity: usize,
}

impl MuxConfig {
    /// Create a configuration with defaults for everything but the address and role.
    pub fn new(host: impl Into<String>, port: u16, role: Role) -> Self {
        Self {
            host: host.into(),
            port,
            role,
            ..Self::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MuxError::config("host must not be empty"));
        }
        if self.chunk_size == 0 {
            return Err(MuxError::config("chunk_size must be greater than zero"));
        }
        if self.event_capacity == 0 {
            return Err(MuxError::config("event_capacity must be greater than zero"));
        }
        if self.line_capacity == 0 {
            return Err(MuxError::config("line_capacity must be greater than zero"));
        }
        if self.role.is_listening() && self.accept_backlog == 0 {
            return Err(MuxError::config("accept_backlog must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            role: Role::Connect,
            accept_backlog: DEFAULT_ACCEPT_BACKLOG,
            chunk_size: DEFAULT_CHUNK_SIZE,
            write_mode: WriteMode::Blocking,
            malformed_policy: MalformedPolicy::Fatal,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            line_capacity: DEFAULT_LINE_CAPACITY,
        }
    }
}
