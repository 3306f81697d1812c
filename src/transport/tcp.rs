//! TCP listener and accept loop.
//!
//! The accept loop runs until the shutdown channel fires, then stops
//! taking new peers and waits for live sessions to drain, bounded by
//! the configured shutdown timeout. Each accepted stream gets its own
//! task; a slow peer never stalls the loop.

use crate::core::codec::FrameCodec;
use crate::error::Result;
use crate::service::server::Server;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{error, info, instrument, warn};

/// Bind the listener for an address like `0.0.0.0:17230`.
pub async fn bind(address: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "Listening");
    Ok(listener)
}

/// Accept connections into `server` until `shutdown_rx` fires, then
/// drain gracefully.
#[instrument(skip_all, fields(address = %server.config().server.address))]
pub async fn serve(
    server: Arc<Server>,
    listener: TcpListener,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Waiting for sessions to close...");
                drain_sessions(&server).await;
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        if let Err(err) = stream.set_nodelay(true) {
                            warn!(peer = %addr, error = %err, "Failed to set TCP_NODELAY");
                        }
                        tokio::spawn(server.clone().handle_peer(stream, addr.to_string()));
                    }
                    Err(err) => {
                        error!(error = %err, "Error accepting connection");
                    }
                }
            }
        }
    }
}

/// Wait for live sessions to close, up to the shutdown timeout, then
/// dispose whatever remains.
async fn drain_sessions(server: &Arc<Server>) {
    let timeout = tokio::time::sleep(server.config().server.shutdown_timeout);
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            _ = &mut timeout => {
                warn!("Shutdown timeout reached, disposing remaining sessions");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                let remaining = server.session_count();
                if remaining == 0 {
                    info!("All sessions closed, shutting down");
                    return;
                }
                info!(sessions = remaining, "Waiting for sessions to close");
            }
        }
    }

    for session in server.sessions() {
        server.dispose_session(session.id());
    }
}

/// Dial a server directly, returning the framed transport. Callers that
/// want the full handshake use [`crate::service::client::Client`]
/// instead.
pub async fn connect(address: &str, max_frame_size: usize) -> Result<Framed<TcpStream, FrameCodec>> {
    let stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    Ok(Framed::new(stream, FrameCodec::new(max_frame_size)))
}
