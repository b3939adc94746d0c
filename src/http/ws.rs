//! Delegate connections over WebSocket.
//!
//! # Data Flow
//! ```text
//! browser ──upgrade──▶ connect_handler ──auth frame──▶ registry.register
//!                                            │
//!                                            ▼
//!                                   protocol::run_connection
//!                            (single loop owns the socket both ways)
//! ```
//!
//! # Design Decisions
//! - The auth frame must arrive first, within a configured window
//! - JSON text frames only; a binary frame is a protocol violation
//! - WebSocket-level ping/pong is transport noise; liveness runs on the
//!   envelope's own ping/pong frames

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;

use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::protocol::{
    run_connection, ConnectionHandle, ConnectionTiming, DelegateTransport, WireMessage,
};

/// `GET /gateway/connect` — upgrade and hand off to the session task.
pub async fn connect_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut transport = WsTransport { socket };

    let auth_window = Duration::from_secs(state.connection.auth_timeout_secs);
    let user_id = match authenticate(&mut transport, &state, auth_window).await {
        Ok(user_id) => user_id,
        Err(reason) => {
            tracing::warn!(reason = %reason, "delegate connection rejected");
            let _ = transport
                .send(WireMessage::Error { message: reason, code: Some(401) })
                .await;
            transport.close().await;
            return;
        }
    };

    let (handle, driver) = ConnectionHandle::new(&user_id, state.connection.outbound_queue);
    handle.mark_open();
    state.registry.register(handle.clone());
    tracing::info!(
        user_id = %user_id,
        connection_id = %handle.id(),
        "delegate connection established"
    );

    let timing = ConnectionTiming::from(&state.connection);
    run_connection(handle.clone(), driver, transport, timing).await;

    state.registry.deregister(&user_id, handle.id());
}

/// Wait for the first frame; it must be `auth` with a known token.
async fn authenticate(
    transport: &mut WsTransport,
    state: &AppState,
    window: Duration,
) -> Result<String, String> {
    let first = tokio::time::timeout(window, transport.recv())
        .await
        .map_err(|_| "no auth frame within window".to_string())?;

    match first {
        Some(Ok(WireMessage::Auth { token })) => state
            .authenticator
            .authenticate(&token)
            .ok_or_else(|| "unknown auth token".to_string()),
        Some(Ok(_)) => Err("first frame must be auth".to_string()),
        Some(Err(e)) => Err(format!("bad first frame: {e}")),
        None => Err("closed before auth".to_string()),
    }
}

/// Production transport: JSON text frames over the axum WebSocket.
struct WsTransport {
    socket: WebSocket,
}

#[async_trait]
impl DelegateTransport for WsTransport {
    async fn send(&mut self, message: WireMessage) -> Result<(), GatewayError> {
        self.socket
            .send(Message::Text(message.to_json().into()))
            .await
            .map_err(|e| GatewayError::Protocol(format!("send failed: {e}")))
    }

    async fn recv(&mut self) -> Option<Result<WireMessage, GatewayError>> {
        loop {
            return match self.socket.recv().await? {
                Ok(Message::Text(text)) => Some(
                    WireMessage::from_json(text.as_str())
                        .map_err(|e| GatewayError::Protocol(format!("malformed frame: {e}"))),
                ),
                // Socket-level keepalive frames are not envelope traffic.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Binary(_)) => {
                    Some(Err(GatewayError::Protocol("binary frame".to_string())))
                }
                Ok(Message::Close(_)) => None,
                Err(e) => Some(Err(GatewayError::Protocol(format!("receive failed: {e}")))),
            };
        }
    }

    async fn close(&mut self) {
        let _ = self.socket.send(Message::Close(None)).await;
    }
}
