//! WebSocket upgrade endpoint
//!
//! Adapts axum's socket to the transport-independent frames the gateway
//! state machine works with.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use futures_util::{future, SinkExt, StreamExt};
use hookgate_gateway::WsFrame;

use crate::state::AppState;

/// `GET /ws`
pub async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let peer_addr = connect_info.map(|ConnectInfo(addr)| addr);
    tracing::info!(peer = ?peer_addr, "Websocket connection starting");
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer_addr))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, peer_addr: Option<SocketAddr>) {
    let (sender, receiver) = socket.split();
    let sink = sender.with(|frame: WsFrame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let stream = receiver.map(|message| message.map(to_frame));

    let reason = state.gateway.run_connection(stream, sink, peer_addr).await;
    tracing::debug!(peer = ?peer_addr, reason = %reason, "Websocket handler finished");
}

fn to_frame(message: Message) -> WsFrame {
    match message {
        Message::Text(text) => WsFrame::Text(text),
        Message::Binary(data) => WsFrame::Binary(data),
        Message::Ping(data) => WsFrame::Ping(data),
        Message::Pong(data) => WsFrame::Pong(data),
        Message::Close(_) => WsFrame::Close,
    }
}

fn to_message(frame: WsFrame) -> Message {
    match frame {
        WsFrame::Text(text) => Message::Text(text),
        WsFrame::Binary(data) => Message::Binary(data),
        WsFrame::Ping(data) => Message::Ping(data),
        WsFrame::Pong(data) => Message::Pong(data),
        WsFrame::Close => Message::Close(None),
    }
}
