//! # Error Types
//!
//! Comprehensive error handling for the wire protocol and session core.
//!
//! This module defines all error variants that can occur during protocol operations,
//! from low-level codec failures to session and command-dispatch rejections.
//!
//! ## Error Categories
//! - **Codec Errors**: Truncated or invalid bytes, oversized frames
//! - **Registry Errors**: Unknown or duplicate data type identifiers
//! - **Session Errors**: Sends against closed connections, handshake failures
//! - **Dispatch Errors**: Unauthorized or unknown administrative commands
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! ## Example Usage
//! ```rust
//! use coopnet::error::{ProtocolError, Result};
//!
//! fn require_auth(authenticated: bool) -> Result<()> {
//!     if !authenticated {
//!         return Err(ProtocolError::Unauthorized);
//!     }
//!     Ok(())
//! }
//!
//! assert!(require_auth(false).is_err());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Codec-level error messages
    pub const ERR_UNTERMINATED_STRING: &str = "String terminator not found before end of stream";
    pub const ERR_INVALID_UTF8: &str = "String bytes are not valid UTF-8";
    pub const ERR_NEGATIVE_LENGTH: &str = "Length prefix is negative";
    pub const ERR_TRAILING_BYTES: &str = "Payload not fully consumed by its data type";
    pub const ERR_TRUNCATED_VALUE: &str = "Stream ended inside a fixed-width value";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_SEND_QUEUE_CLOSED: &str = "Outbound queue closed";

    /// Handshake errors
    pub const ERR_HANDSHAKE_TIMEOUT: &str = "Peer did not complete the handshake in time";
    pub const ERR_HANDSHAKE_EXPECTED_HELLO: &str = "First message was not a client hello";

    /// Control-plane errors
    pub const ERR_BAD_PASSWORD: &str = "Control password mismatch";
    pub const ERR_CONTROL_DISABLED: &str = "No control password configured";
}

/// Primary error type for all protocol, session, and dispatch operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Codec-level failure: the bytes on the stream do not match the schema
    /// the data type expected. The stream is considered desynchronized.
    #[error("Malformed stream: {0}")]
    MalformedStream(&'static str),

    /// The buffer ended before a complete value could be read.
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Write-side rejection: the value cannot be represented on the wire
    /// (currently only strings containing an interior NUL byte).
    #[error("String contains a NUL byte and cannot be null-terminated")]
    InvalidString,

    /// An inbound message named a data type this build has not registered.
    /// Whether this drops the message or the connection is deployment policy.
    #[error("Unknown data type ID: {0:?}")]
    UnknownDataId(String),

    /// Two data types claimed the same identifier during registration.
    /// Startup-time configuration error; fatal before accepting connections.
    #[error("Duplicate data type ID: {0:?}")]
    DuplicateDataId(&'static str),

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch { client: u16, server: u16 },

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    /// Command dispatch rejected the caller before running the command.
    #[error("Caller is not authenticated")]
    Unauthorized,

    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
