//! # Core Wire Components
//!
//! Low-level binary reading/writing and stream framing.
//!
//! This module provides the foundation for the protocol: primitive value
//! (de)serialization and the codec that delimits messages on a byte stream.
//!
//! ## Components
//! - **Wire**: Primitive reader/writer (strings, blobs, integers, colors)
//! - **Codec**: Tokio codec framing whole messages over byte streams
//!
//! ## Wire Format
//! ```text
//! frame:   [Length(4, u32 LE)] [Message(N)]
//! message: [DataID: null-terminated string] [type-specific payload]
//! ```
//!
//! All integers are fixed-width little-endian; this is the wire contract and
//! both peers must agree on it. Strings are UTF-8 followed by a single 0x00
//! terminator. Byte blobs carry an i32 length prefix.
//!
//! The outer length prefix exists so a receiver can skip a message it cannot
//! parse (unknown data type, schema mismatch) without losing stream sync.
//!
//! ## Limits
//! - Maximum frame size: 4MB by default (prevents memory exhaustion)
//! - Length validation before allocation

pub mod codec;
pub mod wire;
