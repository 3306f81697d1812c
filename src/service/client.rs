//! Client side of the protocol: connect, handshake, typed send/recv.
//!
//! The client keeps the surface thin: it dials the configured server,
//! performs the hello/welcome exchange, then exposes typed message I/O.
//! Game hooks (state sync payload handling, rendering) stay outside;
//! embedders drive `recv` and match on the payload types they care
//! about.

use crate::config::{ClientConfig, MAX_FRAME_SIZE, PROTOCOL_VERSION};
use crate::core::codec::FrameCodec;
use crate::error::{ProtocolError, Result};
use crate::protocol::data::{
    DataChat, DataClientHello, DataContext, DataDisconnectReason, DataInternalDisconnect, DataType,
};
use crate::protocol::registry::DataTypeRegistry;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// A connected, handshaken client.
pub struct Client {
    config: ClientConfig,
    registry: Arc<DataTypeRegistry>,
    framed: Framed<TcpStream, FrameCodec>,
    player_id: u32,
    name: String,
    token: u64,
}

impl Client {
    /// Connect once and complete the handshake.
    pub async fn connect(config: ClientConfig, registry: Arc<DataTypeRegistry>) -> Result<Self> {
        let (host, port) = config.host_port();
        let stream = timeout(config.connect_timeout, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| {
                ProtocolError::HandshakeError(format!("Connect timeout to {host}:{port}"))
            })??;
        stream.set_nodelay(true)?;

        let framed = Framed::new(stream, FrameCodec::new(MAX_FRAME_SIZE));
        // The token persists across reconnects so the server resolves
        // this installation to the same UID.
        let token = config.client_token.unwrap_or_else(rand::random::<u64>);

        let mut client = Self {
            config,
            registry,
            framed,
            player_id: 0,
            name: String::new(),
            token,
        };
        client.handshake().await?;
        Ok(client)
    }

    /// Connect honoring the reconnect settings: on failure, retry up to
    /// `max_reconnect_attempts` times with `reconnect_delay` between
    /// attempts, provided `auto_reconnect` is set.
    pub async fn connect_with_retry(
        config: ClientConfig,
        registry: Arc<DataTypeRegistry>,
    ) -> Result<Self> {
        let attempts = if config.auto_reconnect {
            config.max_reconnect_attempts.max(1)
        } else {
            1
        };

        let mut last_err = ProtocolError::ConnectionClosed;
        for attempt in 1..=attempts {
            match Self::connect(config.clone(), registry.clone()).await {
                Ok(client) => return Ok(client),
                Err(err) => {
                    warn!(attempt, attempts, error = %err, "Connect attempt failed");
                    last_err = err;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(config.reconnect_delay).await;
            }
        }
        Err(last_err)
    }

    async fn handshake(&mut self) -> Result<()> {
        let hello = DataClientHello {
            protocol_version: PROTOCOL_VERSION,
            name: self.config.name.clone(),
            key: self.config.key.clone(),
            token: self.token,
        };
        self.send(&hello).await?;

        let reply = self.recv_timeout(self.config.connect_timeout).await?;
        if let Some(welcome) = reply.downcast_ref::<crate::protocol::data::DataServerWelcome>() {
            self.player_id = welcome.player_id;
            self.name = welcome.name.clone();
            info!(player_id = self.player_id, name = %self.name, "Connected");
            return Ok(());
        }
        if let Some(reason) = reply.downcast_ref::<DataDisconnectReason>() {
            return Err(ProtocolError::HandshakeError(reason.text.clone()));
        }
        Err(ProtocolError::HandshakeError(format!(
            "Unexpected handshake reply: {}",
            reply.data_id()
        )))
    }

    /// Player ID assigned by the server; 0 before the handshake.
    pub fn player_id(&self) -> u32 {
        self.player_id
    }

    /// Display name as the server adopted it (possibly sanitized).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Persistent installation token used for UID derivation.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Serialize and send one payload.
    pub async fn send(&mut self, data: &dyn DataType) -> Result<()> {
        let mut ctx = DataContext::for_player(PROTOCOL_VERSION, self.player_id);
        let frame = self.registry.encode(&mut ctx, data)?;
        self.framed.send(frame).await
    }

    /// Receive the next payload this build understands. Messages naming
    /// unregistered data types are logged and skipped (the frame kept
    /// the stream in sync), matching the server's default policy.
    pub async fn recv(&mut self) -> Result<Box<dyn DataType>> {
        loop {
            let frame = self
                .framed
                .next()
                .await
                .ok_or(ProtocolError::ConnectionClosed)??;

            let mut ctx = DataContext::for_player(PROTOCOL_VERSION, self.player_id);
            match self.registry.read(&mut ctx, &frame) {
                Ok(data) => return Ok(data),
                Err(ProtocolError::UnknownDataId(id)) => {
                    debug!(data_id = %id, "Skipping unknown data type from server");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// `recv` with a deadline.
    pub async fn recv_timeout(&mut self, limit: Duration) -> Result<Box<dyn DataType>> {
        timeout(limit, self.recv())
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)?
    }

    /// Send a chat line. The server stamps the sender ID and color.
    pub async fn chat(&mut self, text: &str) -> Result<()> {
        self.send(&DataChat {
            text: text.to_string(),
            ..DataChat::default()
        })
        .await
    }

    /// Cooperative leave: reason (optional), terminal payload, close.
    pub async fn close(mut self, reason: Option<&str>) -> Result<()> {
        if let Some(text) = reason {
            let _ = self
                .send(&DataDisconnectReason {
                    text: text.to_string(),
                })
                .await;
        }
        let _ = self.send(&DataInternalDisconnect).await;
        self.framed.close().await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.config.server)
            .field("player_id", &self.player_id)
            .field("name", &self.name)
            .finish()
    }
}
