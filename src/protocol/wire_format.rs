//! Wire format encoding and decoding.
//!
//! One frame per line, each line a JSON object with exactly three fields:
//! ```text
//! {"id": <integer>, "type": "connect" | "data" | "disconnect", "payload": "<base64>"}
//! ```
//!
//! Lines end with a single `\n`. The payload is base-64 so that arbitrary
//! bytes never break the line framing.

use serde::{Deserialize, Serialize};

use super::frame::{ConnId, Frame, FrameKind};
use crate::codec::Base64Codec;
use crate::error::{MuxError, Result};

/// Terminator written after every encoded frame.
pub const LINE_TERMINATOR: &str = "\n";

/// JSON shape of a frame on the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFrame {
    /// Connection id.
    pub id: ConnId,
    /// Frame kind, serialized under the `type` key.
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Base-64 encoded payload.
    pub payload: String,
}

impl From<&Frame> for WireFrame {
    fn from(frame: &Frame) -> Self {
        Self {
            id: frame.id,
            kind: frame.kind,
            payload: Base64Codec::encode(&frame.payload),
        }
    }
}

impl TryFrom<WireFrame> for Frame {
    type Error = MuxError;

    fn try_from(wire: WireFrame) -> Result<Self> {
        let payload = Base64Codec::decode(&wire.payload)?;
        Ok(Frame::new(wire.id, wire.kind, payload))
    }
}

/// Encode a frame as exactly one line, including the trailing `\n`.
///
/// Field order is always `id`, `type`, `payload`.
pub fn encode_line(frame: &Frame) -> Result<String> {
    let mut line = serde_json::to_string(&WireFrame::from(frame))?;
    line.push_str(LINE_TERMINATOR);
    Ok(line)
}

/// Decode one control-channel line into a frame.
///
/// A trailing `\n` or `\r\n` is tolerated.
///
/// # Errors
///
/// Returns [`MuxError::MalformedFrame`] if the line is not a JSON object with
/// the three required fields, the kind is unknown, the id is not a
/// non-negative integer, or the payload is not valid base-64.
pub fn decode_line(line: &str) -> Result<Frame> {
    let trimmed = line.trim_end_matches(['\n', '\r']);
    if trimmed.trim().is_empty() {
        return Err(MuxError::malformed("empty line"));
    }

    let wire: WireFrame = serde_json::from_str(trimmed)
        .map_err(|e| MuxError::malformed(format!("{}: {:?}", e, truncate(trimmed, 120))))?;

    Frame::try_from(wire)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
