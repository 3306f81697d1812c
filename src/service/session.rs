//! Server-side representation of one connected peer.
//!
//! A [`PlayerSession`] binds an identity to a connection: the numeric
//! player ID (unique while connected, handed out sequentially), the
//! stable UID the moderation history is keyed by, and the display name.
//! Identity fields are plain immutable data, readable without
//! synchronization once the session is published to the table.
//!
//! The `leave_reason` field is the one piece of mutable moderation
//! state: a kick sets it before disposal so observers see "got kicked"
//! instead of the ordinary leave message. It is consumed exactly once,
//! when the server announces the departure.

use crate::config::PROTOCOL_VERSION;
use crate::protocol::data::{DataContext, DataType};
use crate::protocol::registry::DataTypeRegistry;
use crate::service::connection::{Connection, ConnectionState};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// One connected peer's identity and transport handle.
///
/// Owned by the server's session table; the connection is exclusively
/// owned by its session. A reconnecting client gets a fresh session
/// (new player ID) that resolves to the same UID.
pub struct PlayerSession {
    id: u32,
    uid: String,
    name: String,
    connection: Arc<Connection>,
    registry: Arc<DataTypeRegistry>,
    /// Reason announced when this session leaves. Set by moderation
    /// actions before disposal, taken once by the leave announcement.
    leave_reason: Mutex<Option<String>>,
    channels: RwLock<HashSet<String>>,
}

impl PlayerSession {
    pub fn new(
        id: u32,
        uid: String,
        name: String,
        connection: Arc<Connection>,
        registry: Arc<DataTypeRegistry>,
    ) -> Self {
        Self {
            id,
            uid,
            name,
            connection,
            registry,
            leave_reason: Mutex::new(None),
            channels: RwLock::new(HashSet::new()),
        }
    }

    /// Numeric player ID, unique while this session is connected.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Stable user identifier; persists across reconnects.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Serialize a payload and enqueue it for this peer. Returns the
    /// number of bytes queued. FIFO relative to other sends on this
    /// session; fails with `ConnectionClosed` once disconnecting.
    pub fn send(&self, data: &dyn DataType) -> crate::error::Result<usize> {
        let mut ctx = DataContext::for_player(PROTOCOL_VERSION, self.id);
        let frame = self.registry.encode(&mut ctx, data)?;
        let len = frame.len();
        self.connection.send_bytes(frame)?;
        Ok(len)
    }

    pub fn set_leave_reason(&self, reason: &str) {
        let mut slot = self
            .leave_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(reason.to_string());
    }

    /// Consume the pending leave reason, if any was set.
    pub fn take_leave_reason(&self) -> Option<String> {
        self.leave_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Channels this session currently belongs to, sorted for stable
    /// output.
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    pub fn in_channel(&self, channel: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(channel)
    }

    pub(crate) fn record_channel(&self, channel: &str) -> bool {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string())
    }

    pub(crate) fn forget_channel(&self, channel: &str) -> bool {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel)
    }

    /// Begin the cooperative shutdown of the underlying connection.
    /// Idempotent: only the first call transitions, later calls are
    /// no-ops returning `false`.
    pub fn dispose(&self) -> bool {
        self.connection.begin_disconnect()
    }
}

impl std::fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("id", &self.id)
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
