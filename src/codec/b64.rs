//! Base-64 payload codec.
//!
//! Uses the standard alphabet with padding, which is what the peer's
//! `b64encode`/`b64decode` produce and accept.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::error::{MuxError, Result};

/// Base-64 codec for frame payloads.
pub struct Base64Codec;

impl Base64Codec {
    /// Encode raw bytes to printable text.
    #[inline]
    pub fn encode(data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    /// Decode printable text back to raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::MalformedFrame`] if the text is not valid base-64.
    pub fn decode(text: &str) -> Result<Bytes> {
        STANDARD
            .decode(text)
            .map(Bytes::from)
            .map_err(|e| MuxError::malformed(format!("invalid base64 payload: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(Base64Codec::encode(b"PING"), "UElORw==");
        assert_eq!(Base64Codec::encode(b"PONG"), "UE9ORw==");
        assert_eq!(Base64Codec::encode(b""), "");
    }

    #[test]
    fn test_empty_round_trip() {
        let decoded = Base64Codec::decode(&Base64Codec::encode(b"")).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_binary_data_preserved() {
        // Every byte value, including ones that are not valid UTF-8
        let all_bytes: Vec<u8> = (0..=255).collect();
        let text = Base64Codec::encode(&all_bytes);
        assert!(text.is_ascii());
        assert!(!text.contains('\n'));
        assert_eq!(&Base64Codec::decode(&text).unwrap()[..], &all_bytes[..]);
    }

    #[test]
    fn test_large_buffer() {
        let large = vec![0xAB; 1024 * 1024];
        let decoded = Base64Codec::decode(&Base64Codec::encode(&large)).unwrap();
        assert_eq!(decoded.len(), large.len());
        assert_eq!(&decoded[..], &large[..]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = Base64Codec::decode("not base64!!").unwrap_err();
        assert!(matches!(err, MuxError::MalformedFrame(_)));
    }
}
