//! Per-peer transport handle.
//!
//! A [`Connection`] owns one framed byte stream through two spawned
//! tasks: a reader that surfaces whole inbound frames and a writer that
//! drains the outbound queue. `send_bytes` is synchronous and never
//! blocks unrelated connections; the writer task serializes the actual
//! transport writes, so frames queued by one caller in sequence reach
//! the peer in that order.
//!
//! The state machine only moves forward:
//!
//! ```text
//! Connecting -> Authenticating -> Active -> Disconnecting -> Closed
//! ```
//!
//! `Closed` is terminal. Once a connection reaches `Disconnecting`,
//! in-flight sends fail fast with [`ProtocolError::ConnectionClosed`]
//! and the writer flushes what was already queued within the grace
//! timeout, whichever ends first.

use crate::core::codec::FrameCodec;
use crate::error::{ProtocolError, Result};
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

/// Lifecycle of one peer connection. Transitions are monotonic.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// Transport accepted, framing not yet running.
    Connecting = 0,
    /// Framed transport established, waiting for identity binding.
    Authenticating = 1,
    /// Handshake complete, session live.
    Active = 2,
    /// Queue draining; no new sends accepted.
    Disconnecting = 3,
    /// Transport gone. Terminal.
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Authenticating,
            2 => Self::Active,
            3 => Self::Disconnecting,
            _ => Self::Closed,
        }
    }
}

enum Outbound {
    Frame(Bytes),
    Shutdown,
}

/// Handle to one peer's transport, shared between the session, the
/// server and the connection's own tasks.
pub struct Connection {
    peer: String,
    state: AtomicU8,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    /// Wrap a byte stream in the frame codec and spawn its reader and
    /// writer tasks. Returns the shared handle plus the channel of
    /// inbound frames; a decode error is delivered once, in order, and
    /// ends the stream.
    pub fn spawn<S>(
        stream: S,
        peer: String,
        max_frame_size: usize,
        grace: Duration,
    ) -> (Arc<Connection>, mpsc::Receiver<Result<BytesMut>>)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let framed = Framed::new(stream, FrameCodec::new(max_frame_size));
        let (sink, source) = framed.split();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(64);

        let conn = Arc::new(Connection {
            peer,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            outbound: outbound_tx,
        });

        tokio::spawn(run_writer(conn.clone(), sink, outbound_rx, grace));
        tokio::spawn(run_reader(conn.clone(), source, inbound_tx));

        (conn, inbound_rx)
    }

    /// Peer label used in logs (socket address or a test tag).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    pub fn is_disconnecting(&self) -> bool {
        self.state() >= ConnectionState::Disconnecting
    }

    /// Move the state forward. Returns `false` when the connection is
    /// already at or past `target`, making every transition idempotent.
    fn advance(&self, target: ConnectionState) -> bool {
        loop {
            let current = self.state.load(Ordering::Acquire);
            if current >= target as u8 {
                return false;
            }
            if self
                .state
                .compare_exchange(current, target as u8, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub(crate) fn mark_authenticating(&self) {
        self.advance(ConnectionState::Authenticating);
    }

    pub(crate) fn mark_active(&self) {
        self.advance(ConnectionState::Active);
    }

    /// Enqueue one serialized message for transmission. FIFO per
    /// connection. Fails fast once the connection is disconnecting.
    pub fn send_bytes(&self, frame: Bytes) -> Result<()> {
        if self.is_disconnecting() {
            return Err(ProtocolError::ConnectionClosed);
        }
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Start the cooperative shutdown: reject new sends, let the writer
    /// drain what is already queued, then close the transport. Safe to
    /// call any number of times; only the first call does anything.
    pub fn begin_disconnect(&self) -> bool {
        if !self.advance(ConnectionState::Disconnecting) {
            return false;
        }
        // Queued frames sit ahead of this marker, so they still flush.
        let _ = self.outbound.send(Outbound::Shutdown);
        true
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish()
    }
}

async fn run_writer<S>(
    conn: Arc<Connection>,
    mut sink: futures::stream::SplitSink<Framed<S, FrameCodec>, Bytes>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    grace: Duration,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let mut deadline: Option<Instant> = None;

    while let Some(item) = outbound.recv().await {
        let frame = match item {
            Outbound::Frame(frame) => frame,
            Outbound::Shutdown => break,
        };

        // Once the connection started disconnecting, the remaining queue
        // gets one shared grace window instead of unbounded patience.
        if deadline.is_none() && conn.is_disconnecting() {
            deadline = Some(Instant::now() + grace);
        }

        let sent = match deadline {
            Some(at) => match timeout_at(at, sink.send(frame)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(peer = %conn.peer(), "Drain grace elapsed, dropping remaining queue");
                    break;
                }
            },
            None => sink.send(frame).await,
        };

        if let Err(err) = sent {
            debug!(peer = %conn.peer(), error = %err, "Transport write failed");
            break;
        }
    }

    let _ = timeout(grace, sink.close()).await;
    conn.advance(ConnectionState::Closed);
    trace!(peer = %conn.peer(), "Writer task finished");
}

async fn run_reader<S>(
    conn: Arc<Connection>,
    mut source: futures::stream::SplitStream<Framed<S, FrameCodec>>,
    inbound: mpsc::Sender<Result<BytesMut>>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    while let Some(item) = source.next().await {
        match item {
            Ok(frame) => {
                if inbound.send(Ok(frame)).await.is_err() {
                    // Receiver side gone; the session is being torn down.
                    break;
                }
            }
            Err(err) => {
                let _ = inbound.send(Err(err)).await;
                break;
            }
        }
    }
    trace!(peer = %conn.peer(), "Reader task finished");
}
