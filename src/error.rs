//! Error types for stdio-mux.

use thiserror::Error;

use crate::protocol::ConnId;

/// Main error type for all multiplexer operations.
#[derive(Debug, Error)]
pub enum MuxError {
    /// I/O error on the control channel or a socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error on the control channel.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A control-channel line could not be parsed into a frame.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// A connection with this id is already registered.
    #[error("Connection id {0} is already registered")]
    DuplicateId(ConnId),

    /// No connection is registered under this id.
    #[error("Unknown connection id: {0}")]
    UnknownConnection(ConnId),

    /// The control channel reached end-of-stream.
    #[error("Control channel closed")]
    ControlChannelClosed,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MuxError {
    /// Create a new malformed frame error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        MuxError::MalformedFrame(msg.into())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        MuxError::Config(msg.into())
    }

    /// Whether this error ends the whole multiplexing session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MuxError::Io(_)
                | MuxError::Json(_)
                | MuxError::MalformedFrame(_)
                | MuxError::ControlChannelClosed
        )
    }

    /// Whether this error is the normal end of a session (control channel EOF).
    pub fn is_session_end(&self) -> bool {
        matches!(self, MuxError::ControlChannelClosed)
    }
}

/// Result type alias using MuxError.
pub type Result<T> = std::result::Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            MuxError::DuplicateId(7).to_string(),
            "Connection id 7 is already registered"
        );
        assert_eq!(
            MuxError::malformed("missing id").to_string(),
            "Malformed frame: missing id"
        );
        assert_eq!(
            MuxError::ControlChannelClosed.to_string(),
            "Control channel closed"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(MuxError::ControlChannelClosed.is_fatal());
        assert!(MuxError::ControlChannelClosed.is_session_end());
        assert!(MuxError::malformed("x").is_fatal());
        assert!(!MuxError::malformed("x").is_session_end());
        assert!(!MuxError::DuplicateId(1).is_fatal());
        assert!(!MuxError::UnknownConnection(1).is_fatal());
        assert!(!MuxError::config("bad").is_fatal());
    }
}
