//! Frame struct with typed constructors.
//!
//! Uses `bytes::Bytes` for zero-copy payload sharing between the reader
//! tasks, the registry queues and the control channel.
//!
//! # Example
//!
//! ```
//! use stdio_mux::protocol::{Frame, FrameKind};
//! use bytes::Bytes;
//!
//! let frame = Frame::data(3, Bytes::from_static(b"PING"));
//! assert_eq!(frame.kind, FrameKind::Data);
//! assert_eq!(frame.payload(), b"PING");
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Connection identifier shared by both endpoints.
pub type ConnId = u64;

/// Kind of a control-channel frame.
///
/// Serialized names are the ones used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    /// A new connection was accepted; payload is the peer address.
    #[serde(rename = "connect")]
    Open,
    /// Raw bytes to relay.
    #[serde(rename = "data")]
    Data,
    /// Tear the connection down; payload is empty.
    #[serde(rename = "disconnect")]
    Close,
}

impl FrameKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Open => "connect",
            FrameKind::Data => "data",
            FrameKind::Close => "disconnect",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete control-channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Connection this frame belongs to.
    pub id: ConnId,
    /// Frame kind.
    pub kind: FrameKind,
    /// Decoded payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(id: ConnId, kind: FrameKind, payload: Bytes) -> Self {
        Self { id, kind, payload }
    }

    /// Create an `open` frame carrying a textual peer address.
    pub fn open(id: ConnId, peer: &str) -> Self {
        Self::new(id, FrameKind::Open, Bytes::copy_from_slice(peer.as_bytes()))
    }

    /// Create a `data` frame.
    pub fn data(id: ConnId, payload: Bytes) -> Self {
        Self::new(id, FrameKind::Data, payload)
    }

    /// Create a `close` frame (empty payload).
    pub fn close(id: ConnId) -> Self {
        Self::new(id, FrameKind::Close, Bytes::new())
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if this is a `close` frame.
    #[inline]
    pub fn is_close(&self) -> bool {
        self.kind == FrameKind::Close
    }

    /// The peer address carried by an `open` frame, lossily decoded.
    pub fn peer_text(&self) -> Option<String> {
        match self.kind {
            FrameKind::Open => Some(String::from_utf8_lossy(&self.payload).into_owned()),
            _ => None,
        }
    }
}
