//! Control channel module - the single duplex line stream between endpoints.
//!
//! Every frame of every multiplexed connection travels over this channel,
//! one JSON line per frame. The channel is split in two halves:
//!
//! - [`ControlReader`]: a background task reads lines and hands them to the
//!   reactor through a bounded channel, so waiting for a line is cancel-safe
//! - [`ControlWriter`]: writes one encoded frame per call and flushes
//!   immediately, so frames are never held back behind later ones
//!
//! # Example
//!
//! ```ignore
//! use stdio_mux::control::stdio;
//! use stdio_mux::protocol::Frame;
//!
//! let (mut reader, mut writer) = stdio(64);
//! writer.send(&Frame::close(3)).await?;
//! let line = reader.next_line().await?;
//! ```

mod channel;
mod stdio;

pub use channel::{ControlReader, ControlWriter, DEFAULT_LINE_CAPACITY};
pub use stdio::stdio;
