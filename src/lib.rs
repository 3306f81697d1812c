//! # coopnet
//!
//! Typed binary wire protocol, session management, and administrative
//! control core for co-op multiplayer services bolted onto
//! single-player games.
//!
//! ## Features
//!
//! - **Self-describing wire format**: every message is
//!   `[DataID: null-terminated string][payload]`, carried in a
//!   length-prefixed frame so unknown messages are skippable without
//!   losing stream sync
//! - **Extensible data type registry**: an explicit startup
//!   registration pass freezes DataID → factory mappings; adding a
//!   payload type never touches the codec or the session layer
//! - **Session lifecycle**: handshake with a deadline, identity binding
//!   (transient player ID, persistent UID), channel membership, FIFO
//!   per-connection send queues, cooperative disconnect with a drain
//!   grace
//! - **Administrative control plane**: named commands with
//!   authorization, structured optional-field inputs, dependency
//!   injection of the server handle
//! - **Chat and moderation**: targeted or broadcast delivery, bounded
//!   chat log, kicks with per-UID persisted history and frontend
//!   notifications
//!
//! ## Quick Start
//!
//! Server:
//!
//! ```rust,no_run
//! use coopnet::config::NetConfig;
//! use coopnet::service::Server;
//! use coopnet::utils::userdata::MemoryUserData;
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> coopnet::Result<()> {
//!     let config = NetConfig::default();
//!     let server = Server::new(config, Arc::new(MemoryUserData::new()))?;
//!     let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
//!     server.run(shutdown_rx).await
//! }
//! ```
//!
//! Client:
//!
//! ```rust,no_run
//! use coopnet::config::ClientConfig;
//! use coopnet::protocol::registry::DataTypeRegistry;
//! use coopnet::service::Client;
//! use std::sync::Arc;
//!
//! # async fn run() -> coopnet::Result<()> {
//! let registry = Arc::new(DataTypeRegistry::with_core_types()?);
//! let mut client = Client::connect(ClientConfig::default(), registry).await?;
//! client.chat("hello from the other side").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Wire Contract
//!
//! All integers are fixed-width little-endian. Strings are UTF-8
//! followed by a single `0x00` terminator. Byte blobs carry an `i32`
//! little-endian length prefix. See [`core`] for the full layout.

pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::NetConfig;
pub use error::{ProtocolError, Result};
pub use protocol::data::DataType;
pub use protocol::registry::DataTypeRegistry;
pub use service::{Client, PlayerSession, Server};
