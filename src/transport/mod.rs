//! # Transport Layer
//!
//! Socket-level plumbing under the session layer. The protocol itself
//! is transport-agnostic; anything implementing `AsyncRead + AsyncWrite`
//! can carry it (tests run it over in-memory duplex pipes). TCP is the
//! transport the server and client ship with.

pub mod tcp;
