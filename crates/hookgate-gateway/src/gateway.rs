//! Gateway main structure
//!
//! Drives the per-connection lifecycle:
//!
//! ```text
//! ACCEPTING --register, route connect--> OPEN --text frame, route default--> OPEN
//! OPEN --close frame | transport error | stream end | panic--> CLOSING
//! CLOSING --remove from registry, route disconnect--> CLOSED
//! ```
//!
//! The CLOSING -> CLOSED step runs exactly once per connection, so every
//! `connect` is balanced by one `disconnect`.

use futures_util::{pin_mut, FutureExt, Sink, Stream, StreamExt};
use hookgate_config::RouteName;
use std::any::Any;
use std::fmt::{self, Display};
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::connection::{run_writer, ConnectionHandle};
use crate::protocol::WsFrame;
use crate::registry::ConnectionRegistry;
use crate::router::EventDispatcher;

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepting,
    Open,
    Closing,
    Closed,
}

/// Why a connection left the OPEN state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent a close frame
    ClientClosed,
    /// Reading from the socket failed
    TransportError(String),
    /// The socket stream ended without a close frame
    StreamEnded,
    /// The connection loop panicked or could not be set up
    Fault(String),
}

impl Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ClientClosed => write!(f, "closed by client"),
            CloseReason::TransportError(e) => write!(f, "transport error: {}", e),
            CloseReason::StreamEnded => write!(f, "stream ended"),
            CloseReason::Fault(e) => write!(f, "fault: {}", e),
        }
    }
}

/// Per-connection bookkeeping owned by the task that accepted it
struct Connection {
    id: String,
    state: ConnectionState,
}

impl Connection {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: ConnectionState::Accepting,
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(connection_id = %self.id, from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }
}

/// Accepts WebSocket connections and routes their lifecycle events
#[derive(Clone)]
pub struct Gateway {
    registry: ConnectionRegistry,
    dispatcher: Arc<dyn EventDispatcher>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("dispatcher", &"<dispatcher>")
            .finish()
    }
}

impl Gateway {
    /// Create a new Gateway instance
    pub fn new(registry: ConnectionRegistry, dispatcher: Arc<dyn EventDispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Get the connection registry
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Run one upgraded connection from OPEN to CLOSED
    ///
    /// `stream` and `sink` are the two halves of the socket. Returns once the
    /// connection is closed, its identity unregistered and `disconnect` routed.
    pub async fn run_connection<St, Si, E>(
        &self,
        stream: St,
        sink: Si,
        peer_addr: Option<SocketAddr>,
    ) -> CloseReason
    where
        St: Stream<Item = Result<WsFrame, E>> + Send,
        Si: Sink<WsFrame> + Send + 'static,
        Si::Error: Display + Send,
        E: Display + Send,
    {
        let mut conn = Connection::new();
        let (handle, rx) = ConnectionHandle::channel(conn.id.clone(), peer_addr);
        let writer = tokio::spawn(run_writer(sink, rx, conn.id.clone()));

        if let Err(e) = self.registry.register(handle.clone()) {
            error!(connection_id = %conn.id, "Failed to register connection: {}", e);
            handle.close();
            let _ = writer.await;
            return CloseReason::Fault(e.to_string());
        }
        conn.transition(ConnectionState::Open);
        info!(connection_id = %conn.id, peer = ?peer_addr, "New connection");

        let reason = AssertUnwindSafe(self.receive_loop(&handle, stream))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!(connection_id = %conn.id, "Unexpected error in connection loop: {}", message);
                CloseReason::Fault(message)
            });

        conn.transition(ConnectionState::Closing);
        info!(connection_id = %conn.id, reason = %reason, "Connection closed");

        self.registry.remove(&conn.id);
        self.dispatcher
            .dispatch(RouteName::Disconnect, &conn.id, String::new())
            .await;
        conn.transition(ConnectionState::Closed);

        handle.close();
        drop(handle);
        if let Err(e) = writer.await {
            warn!(connection_id = %conn.id, "Writer task failed: {}", e);
        }

        reason
    }

    /// Route `connect`, then one `default` per text frame, in arrival order
    async fn receive_loop<St, E>(&self, handle: &ConnectionHandle, stream: St) -> CloseReason
    where
        St: Stream<Item = Result<WsFrame, E>>,
        E: Display + Send,
    {
        let connection_id = handle.id();
        self.dispatcher
            .dispatch(RouteName::Connect, connection_id, String::new())
            .await;

        pin_mut!(stream);
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsFrame::Text(text)) => {
                    debug!(connection_id = %connection_id, len = text.len(), "Message received");
                    handle.touch().await;
                    self.dispatcher
                        .dispatch(RouteName::Default, connection_id, text)
                        .await;
                }
                Ok(WsFrame::Close) => {
                    info!(connection_id = %connection_id, "WebSocket closed by client");
                    return CloseReason::ClientClosed;
                }
                Ok(other) => {
                    debug!(connection_id = %connection_id, kind = other.kind(), "Ignoring frame");
                }
                Err(e) => {
                    error!(connection_id = %connection_id, "WebSocket connection closed with exception: {}", e);
                    return CloseReason::TransportError(e.to_string());
                }
            }
        }

        CloseReason::StreamEnded
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

/// Gateway-related errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}
