//! Wire-level types
//!
//! Frames exchanged with WebSocket clients and the JSON bodies of the
//! connection management endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WebSocket frame, independent of the server library that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

impl WsFrame {
    /// Short frame kind used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            WsFrame::Text(_) => "text",
            WsFrame::Binary(_) => "binary",
            WsFrame::Ping(_) => "ping",
            WsFrame::Pong(_) => "pong",
            WsFrame::Close => "close",
        }
    }
}

/// Body of `POST /connections/{connectionId}`
///
/// Both fields are optional at the parsing level so that a missing field
/// can be reported as an invalid request rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Snapshot of a live connection, returned by `GET /connections/{connectionId}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub connected_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
}
