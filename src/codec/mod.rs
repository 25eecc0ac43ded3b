//! Codec module - printable encoding for frame payloads.
//!
//! The control channel is line-oriented text, so payload bytes must be
//! carried in a form that never contains a newline and survives any byte
//! value. [`Base64Codec`] provides that using standard, padded base-64.
//!
//! # Design
//!
//! Codecs are implemented as marker structs with static methods rather than trait objects.
//!
//! # Example
//!
//! ```
//! use stdio_mux::codec::Base64Codec;
//!
//! let text = Base64Codec::encode(b"\x00\xffPING\n");
//! assert!(!text.contains('\n'));
//! assert_eq!(&Base64Codec::decode(&text).unwrap()[..], b"\x00\xffPING\n");
//! ```

mod b64;

pub use b64::Base64Codec;
