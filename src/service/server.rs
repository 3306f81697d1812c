//! Server state and the per-connection handling pipeline.
//!
//! The [`Server`] owns the live session table, channel membership, the
//! chat/moderation module, metrics, the user data store and the
//! frontend notifier. Each accepted transport runs through
//! [`Server::handle_peer`]: handshake with a deadline, identity
//! binding, then the inbound routing loop until the peer leaves or the
//! stream turns bad.
//!
//! Shared state is fine-grained: the session table and the channel map
//! each have their own lock with short, non-awaiting critical sections;
//! there is no single server-wide lock.

use crate::config::{NetConfig, UnknownDataPolicy, DEFAULT_CHANNEL, PROTOCOL_VERSION};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::data::{
    DataChat, DataClientHello, DataContext, DataDisconnectReason, DataInternalDisconnect,
    DataNetEmoji, DataPlayerInfo, DataServerWelcome, DataType,
};
use crate::protocol::registry::DataTypeRegistry;
use crate::service::chat::{ChatMessage, ChatModule};
use crate::service::connection::Connection;
use crate::service::session::PlayerSession;
use crate::utils::metrics::Metrics;
use crate::utils::notify::Notifier;
use crate::utils::userdata::UserDataStore;
use bytes::BytesMut;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Display names longer than this are truncated during the handshake.
const MAX_NAME_LEN: usize = 32;

/// Live server state shared across connection tasks.
pub struct Server {
    config: NetConfig,
    registry: Arc<DataTypeRegistry>,
    sessions: RwLock<HashMap<u32, Arc<PlayerSession>>>,
    channels: RwLock<HashMap<String, HashSet<u32>>>,
    next_player_id: AtomicU32,
    chat: ChatModule,
    metrics: Metrics,
    store: Arc<dyn UserDataStore>,
    notifier: Notifier,
}

impl Server {
    /// Build a server with the core data types registered. Validates
    /// the configuration strictly; a bad config never reaches the
    /// accept loop.
    pub fn new(config: NetConfig, store: Arc<dyn UserDataStore>) -> Result<Arc<Self>> {
        let registry = Arc::new(DataTypeRegistry::with_core_types()?);
        Self::with_registry(config, store, registry)
    }

    /// Build a server around an already-assembled registry, for
    /// embedders that register additional data types.
    pub fn with_registry(
        config: NetConfig,
        store: Arc<dyn UserDataStore>,
        registry: Arc<DataTypeRegistry>,
    ) -> Result<Arc<Self>> {
        config.validate_strict()?;
        let notifier = Notifier::new(config.control.notify_capacity);
        let chat = ChatModule::new(config.chat.clone());
        Ok(Arc::new(Self {
            config,
            registry,
            sessions: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            next_player_id: AtomicU32::new(1),
            chat,
            metrics: Metrics::new(),
            store,
            notifier,
        }))
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DataTypeRegistry> {
        &self.registry
    }

    pub fn chat(&self) -> &ChatModule {
        &self.chat
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn store(&self) -> &dyn UserDataStore {
        self.store.as_ref()
    }

    /// Look up a live session by its numeric player ID.
    pub fn session(&self, id: u32) -> Option<Arc<PlayerSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Every live session, in no particular order.
    pub fn sessions(&self) -> Vec<Arc<PlayerSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Serialize a payload and queue it for one session, counting the
    /// bytes for metrics.
    pub fn send_to(&self, session: &PlayerSession, data: &dyn DataType) -> Result<()> {
        let queued = session.send(data)?;
        self.metrics.message_sent(queued as u64);
        Ok(())
    }

    /// Queue a payload for every live session except `from` (0 sends to
    /// everyone). Failed sends are skipped.
    pub fn forward_from(&self, from: u32, data: &dyn DataType) {
        for session in self.sessions() {
            if session.id() == from {
                continue;
            }
            if let Err(err) = self.send_to(&session, data) {
                debug!(player_id = session.id(), error = %err, "Skipping departed session");
            }
        }
    }

    /// Add a session to a named channel. Membership is many-to-many and
    /// carries no ownership; channel semantics beyond membership live
    /// outside this core.
    pub fn join_channel(&self, session: &PlayerSession, channel: &str) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(channel.to_string())
            .or_default()
            .insert(session.id());
        session.record_channel(channel);
    }

    /// Remove a session from a named channel; empty channels disappear.
    pub fn leave_channel(&self, session: &PlayerSession, channel: &str) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(members) = channels.get_mut(channel) {
            members.remove(&session.id());
            if members.is_empty() {
                channels.remove(channel);
            }
        }
        session.forget_channel(channel);
    }

    /// Player IDs currently in a channel, sorted.
    pub fn channel_members(&self, channel: &str) -> Vec<u32> {
        let channels = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut members: Vec<u32> = channels
            .get(channel)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    /// Remove a session from the live table and announce its departure.
    ///
    /// Idempotent: the entry is released exactly once; a second call for
    /// the same ID finds nothing and returns `false`. The announcement
    /// uses the session's explicit leave reason when one was set (kick),
    /// falling back to the configured leave message.
    pub fn dispose_session(&self, id: u32) -> bool {
        let session = {
            let mut sessions = self
                .sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            match sessions.remove(&id) {
                Some(session) => session,
                None => return false,
            }
        };

        for channel in session.channels() {
            self.leave_channel(&session, &channel);
        }

        session.dispose();
        self.metrics.connection_closed();

        let reason = session
            .take_leave_reason()
            .unwrap_or_else(|| self.config.chat.message_leave.clone());

        self.forward_from(
            id,
            &DataPlayerInfo {
                player_id: id,
                name: session.name().to_string(),
                present: false,
            },
        );
        self.chat
            .broadcast(self, ChatMessage::system(format!("{} {}", session.name(), reason)));

        self.notifier.session_ended(session.uid());
        info!(player_id = id, uid = session.uid(), %reason, "Session disposed");
        true
    }

    /// Bind the configured listen address and serve until the shutdown
    /// channel fires.
    pub async fn run(self: &Arc<Self>, shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let listener = crate::transport::tcp::bind(&self.config.server.address).await?;
        crate::transport::tcp::serve(self.clone(), listener, shutdown_rx).await
    }

    /// Drive one accepted transport from handshake to teardown.
    ///
    /// Never returns an error: every failure path logs, updates metrics
    /// and tears the connection down locally.
    #[instrument(skip(self, stream), fields(%peer))]
    pub async fn handle_peer<S>(self: Arc<Self>, stream: S, peer: String)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.metrics.connection_established();
        let (conn, mut inbound) = Connection::spawn(
            stream,
            peer.clone(),
            self.config.server.max_frame_size,
            self.config.server.disconnect_grace,
        );
        conn.mark_authenticating();

        self.metrics.handshake_attempt();
        let session = match self.handshake(&conn, &mut inbound).await {
            Ok(session) => {
                self.metrics.handshake_success();
                session
            }
            Err(err) => {
                self.metrics.handshake_failed();
                warn!(%peer, error = %err, "Handshake failed");
                conn.begin_disconnect();
                self.metrics.connection_closed();
                return;
            }
        };

        info!(
            player_id = session.id(),
            uid = session.uid(),
            name = session.name(),
            "Session active"
        );

        while let Some(item) = inbound.recv().await {
            let frame = match item {
                Ok(frame) => frame,
                Err(err) => {
                    error!(player_id = session.id(), error = %err, "Inbound stream error");
                    self.metrics.protocol_error();
                    break;
                }
            };
            if !self.route_frame(&session, frame) {
                break;
            }
        }

        self.dispose_session(session.id());
    }

    /// Read and validate the client hello, bind identity, publish the
    /// session and announce the join.
    async fn handshake(
        &self,
        conn: &Arc<Connection>,
        inbound: &mut mpsc::Receiver<Result<BytesMut>>,
    ) -> Result<Arc<PlayerSession>> {
        let frame = timeout(self.config.server.auth_timeout, inbound.recv())
            .await
            .map_err(|_| {
                ProtocolError::HandshakeError(constants::ERR_HANDSHAKE_TIMEOUT.to_string())
            })?
            .ok_or(ProtocolError::ConnectionClosed)??;

        let mut ctx = DataContext::new(PROTOCOL_VERSION);
        let data = self.registry.read(&mut ctx, &frame)?;
        let hello = match data.downcast_ref::<DataClientHello>() {
            Some(hello) => hello,
            None => {
                self.refuse(conn, constants::ERR_HANDSHAKE_EXPECTED_HELLO);
                return Err(ProtocolError::HandshakeError(
                    constants::ERR_HANDSHAKE_EXPECTED_HELLO.to_string(),
                ));
            }
        };

        if hello.protocol_version != PROTOCOL_VERSION {
            let err = ProtocolError::VersionMismatch {
                client: hello.protocol_version,
                server: PROTOCOL_VERSION,
            };
            self.refuse(conn, &err.to_string());
            return Err(err);
        }

        if self.session_count() >= self.config.server.max_connections {
            self.refuse(conn, "Server is full");
            return Err(ProtocolError::HandshakeError("Server is full".to_string()));
        }

        // The UID is derived from the persistent client token, so a
        // reconnecting installation resolves to the same identity.
        let uid = format!("uid-{:016x}", hello.token);
        if !hello.key.is_empty() {
            if let Err(err) = self.store.set_key(&uid, &hello.key) {
                warn!(%uid, error = %err, "Failed to register login key");
            }
        }

        let player_id = self.next_player_id.fetch_add(1, Ordering::Relaxed);
        let name = sanitize_name(&hello.name);
        let session = Arc::new(PlayerSession::new(
            player_id,
            uid,
            name.clone(),
            conn.clone(),
            self.registry.clone(),
        ));

        {
            let mut sessions = self
                .sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            sessions.insert(player_id, session.clone());
        }
        conn.mark_active();
        self.join_channel(&session, DEFAULT_CHANNEL);

        self.send_to(
            &session,
            &DataServerWelcome {
                player_id,
                name: name.clone(),
            },
        )?;

        self.forward_from(
            player_id,
            &DataPlayerInfo {
                player_id,
                name: name.clone(),
                present: true,
            },
        );
        self.chat.broadcast(
            self,
            ChatMessage::system(format!("{} {}", name, self.config.chat.message_join)),
        );
        self.notifier.session_started(session.uid());

        Ok(session)
    }

    /// Best-effort rejection: reason payload, terminal payload, then
    /// shutdown. The peer may never see them if the transport dies
    /// first.
    fn refuse(&self, conn: &Arc<Connection>, reason: &str) {
        let mut ctx = DataContext::new(PROTOCOL_VERSION);
        if let Ok(frame) = self.registry.encode(
            &mut ctx,
            &DataDisconnectReason {
                text: reason.to_string(),
            },
        ) {
            let _ = conn.send_bytes(frame);
        }
        if let Ok(frame) = self.registry.encode(&mut ctx, &DataInternalDisconnect) {
            let _ = conn.send_bytes(frame);
        }
    }

    /// Decode one frame and route it. Returns `false` when the
    /// connection should close.
    fn route_frame(&self, session: &Arc<PlayerSession>, frame: BytesMut) -> bool {
        self.metrics.message_received(frame.len() as u64);

        let mut ctx = DataContext::for_player(PROTOCOL_VERSION, session.id());
        let data = match self.registry.read(&mut ctx, &frame) {
            Ok(data) => data,
            Err(ProtocolError::UnknownDataId(id)) => {
                self.metrics.unknown_data();
                return match self.config.server.unknown_data {
                    UnknownDataPolicy::Drop => {
                        // The outer frame kept the stream in sync, so a
                        // version-skewed peer just loses this message.
                        warn!(player_id = session.id(), data_id = %id, "Dropping unknown data type");
                        true
                    }
                    UnknownDataPolicy::Disconnect => {
                        warn!(player_id = session.id(), data_id = %id, "Unknown data type, disconnecting peer");
                        false
                    }
                };
            }
            Err(err) => {
                // Payload-level disagreement: the schema itself is wrong
                // and nothing after this frame can be trusted.
                error!(player_id = session.id(), error = %err, "Protocol error, disconnecting peer");
                self.metrics.protocol_error();
                return false;
            }
        };

        self.route(session, data.as_ref())
    }

    fn route(&self, session: &Arc<PlayerSession>, data: &dyn DataType) -> bool {
        if let Some(chat) = data.downcast_ref::<DataChat>() {
            // The server stamps the sender ID; whatever the client put
            // in the field is ignored.
            self.chat
                .broadcast(self, ChatMessage::from_player(session.id(), chat.text.clone()));
            true
        } else if data.is::<DataInternalDisconnect>() {
            debug!(player_id = session.id(), "Peer requested disconnect");
            false
        } else if let Some(reason) = data.downcast_ref::<DataDisconnectReason>() {
            // Client-stated reason for an imminent leave; informational.
            if !reason.text.is_empty() {
                session.set_leave_reason(&reason.text);
            }
            true
        } else if let Some(emoji) = data.downcast_ref::<DataNetEmoji>() {
            debug!(
                player_id = session.id(),
                emoji = %emoji.text,
                bytes = emoji.data.len(),
                "Relaying emoji registration"
            );
            self.forward_from(session.id(), data);
            true
        } else {
            // Registered but not server-routable (e.g. a stray welcome).
            debug!(
                player_id = session.id(),
                data_id = data.data_id(),
                "Ignoring unroutable payload"
            );
            true
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.config.server.address)
            .field("sessions", &self.session_count())
            .finish()
    }
}

/// Trim, fall back to "Guest", cap at [`MAX_NAME_LEN`] characters.
fn sanitize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "Guest".to_string();
    }
    trimmed.chars().take(MAX_NAME_LEN).collect()
}
