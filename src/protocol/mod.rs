//! Protocol module - frame types and the control-channel wire format.
//!
//! This module implements the line protocol spoken on the control channel:
//! - [`Frame`] and [`FrameKind`], the in-memory representation
//! - JSON line encoding/decoding with base-64 payloads

mod frame;
mod wire_format;

pub use frame::{ConnId, Frame, FrameKind};
pub use wire_format::{decode_line, encode_line, WireFrame, LINE_TERMINATOR};
