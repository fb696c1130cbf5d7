//! Out-of-band delivery to a connection by identity
//!
//! Used both by the `POST /connections/{connectionId}` endpoint and by the
//! event router when a webhook reply carries a `body`.

use serde_json::Value;
use tracing::{debug, warn};

use crate::connection::ConnectionError;
use crate::protocol::PushRequest;
use crate::registry::ConnectionRegistry;

/// Validate a push request and deliver its `data` to the addressed connection
pub async fn push(registry: &ConnectionRegistry, request: PushRequest) -> Result<(), PushError> {
    let connection_id = request
        .connection_id
        .filter(|id| !id.is_empty())
        .ok_or(PushError::InvalidRequest)?;
    let data = request.data.ok_or(PushError::InvalidRequest)?;

    deliver(registry, &connection_id, &data).await
}

/// Serialize `data` as JSON and write it to the connection as one text frame
pub async fn deliver(
    registry: &ConnectionRegistry,
    connection_id: &str,
    data: &Value,
) -> Result<(), PushError> {
    let handle = registry
        .lookup(connection_id)
        .ok_or_else(|| PushError::Gone(connection_id.to_string()))?;

    match handle.send_text(data.to_string()).await {
        Ok(()) => {
            debug!(connection_id = %connection_id, "Message delivered");
            Ok(())
        }
        // The connection closed between lookup and write
        Err(ConnectionError::Closed) => Err(PushError::Gone(connection_id.to_string())),
        Err(e) => {
            warn!(connection_id = %connection_id, "Failed to deliver message: {}", e);
            Err(PushError::SendFailed(e.to_string()))
        }
    }
}

/// Push-related errors
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Invalid request. Both connectionId and data are required.")]
    InvalidRequest,
    #[error("Invalid connectionId: {0}")]
    Gone(String),
    #[error("Failed to send message: {0}")]
    SendFailed(String),
}

impl PushError {
    /// HTTP status code reported to the caller
    pub fn status(&self) -> u16 {
        match self {
            PushError::InvalidRequest => 400,
            PushError::Gone(_) => 410,
            PushError::SendFailed(_) => 500,
        }
    }
}
