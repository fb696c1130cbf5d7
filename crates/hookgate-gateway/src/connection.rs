//! WebSocket connection handles
//!
//! A `ConnectionHandle` is a cheap, cloneable reference to a live socket.
//! Writes travel over a channel to the connection's writer task, which
//! acknowledges each one so callers see the real transport outcome.

use chrono::{DateTime, Utc};
use futures_util::{pin_mut, Sink, SinkExt};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, warn};

use crate::protocol::{ConnectionInfo, WsFrame};

/// Work item for a connection's writer task
#[derive(Debug)]
pub enum Outbound {
    /// Write a text frame and report the result on `ack`
    Text {
        text: String,
        ack: oneshot::Sender<Result<(), String>>,
    },
    /// Close the socket and stop the writer
    Close,
}

/// Handle to a WebSocket connection for sending messages
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Connection ID
    id: String,
    /// Client address, when the transport exposes it
    peer_addr: Option<SocketAddr>,
    connected_at: DateTime<Utc>,
    last_active_at: Arc<RwLock<DateTime<Utc>>>,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Create a new connection handle writing into `sender`
    pub fn new(
        id: impl Into<String>,
        peer_addr: Option<SocketAddr>,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            peer_addr,
            connected_at: now,
            last_active_at: Arc::new(RwLock::new(now)),
            sender,
        }
    }

    /// Create a handle together with the receiving end its writer task drains
    pub fn channel(
        id: impl Into<String>,
        peer_addr: Option<SocketAddr>,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, peer_addr, tx), rx)
    }

    /// Get connection ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Write a text frame to the client and wait for the writer's verdict
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), ConnectionError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(Outbound::Text {
                text: text.into(),
                ack,
            })
            .map_err(|_| ConnectionError::Closed)?;

        match done.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Transport(e)),
            Err(_) => Err(ConnectionError::Closed),
        }
    }

    /// Ask the writer task to close the socket
    pub fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }

    /// Record inbound activity
    pub async fn touch(&self) {
        *self.last_active_at.write().await = Utc::now();
    }

    pub async fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            connection_id: self.id.clone(),
            connected_at: self.connected_at,
            last_active_at: *self.last_active_at.read().await,
            source_ip: self.peer_addr.map(|addr| addr.ip().to_string()),
        }
    }
}

/// Drain `rx` into `sink` until a close request, a write failure, or every
/// handle is dropped. Writes still queued after a failure are dropped,
/// which their senders observe as `ConnectionError::Closed`.
pub async fn run_writer<S>(sink: S, mut rx: mpsc::UnboundedReceiver<Outbound>, connection_id: String)
where
    S: Sink<WsFrame>,
    S::Error: Display + Send,
{
    pin_mut!(sink);

    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Text { text, ack } => match sink.send(WsFrame::Text(text)).await {
                Ok(()) => {
                    let _ = ack.send(Ok(()));
                }
                Err(e) => {
                    warn!(connection_id = %connection_id, "Failed to write to socket: {}", e);
                    let _ = ack.send(Err(e.to_string()));
                    break;
                }
            },
            Outbound::Close => break,
        }
    }

    rx.close();
    if let Err(e) = sink.close().await {
        debug!(connection_id = %connection_id, "Socket close failed: {}", e);
    }
    debug!(connection_id = %connection_id, "Writer stopped");
}

/// Connection-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection closed")]
    Closed,
    #[error("Transport error: {0}")]
    Transport(String),
}
