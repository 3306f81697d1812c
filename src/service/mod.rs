//! # Session and Service Layer
//!
//! Everything that happens between the frame codec and the game:
//! per-peer connection lifecycle, identity binding, the live session
//! table, chat/moderation, and the client counterpart.
//!
//! ## Components
//! - **Connection**: one peer's transport handle and state machine
//! - **Session**: identity bound to a connection (player ID, UID, name)
//! - **Server**: session table, handshake, inbound routing, channels
//! - **Chat**: targeted/broadcast delivery, kick flow, persisted history
//! - **Client**: connect + handshake + typed send/recv with reconnect
//!
//! ## Lifecycle
//! ```text
//! accept -> handshake (hello/welcome, deadline) -> Active
//!        -> route frames (chat, emoji, leave)    -> Disconnecting
//!        -> drain queue or grace timeout         -> Closed
//! ```

pub mod chat;
pub mod client;
pub mod connection;
pub mod server;
pub mod session;

pub use chat::{ChatMessage, ChatModule, KickEntry, KickHistory, KICK_HISTORY_KIND};
pub use client::Client;
pub use connection::{Connection, ConnectionState};
pub use server::Server;
pub use session::PlayerSession;
