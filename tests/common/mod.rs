//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use session_gateway::protocol::WireMessage;
use session_gateway::{GatewayConfig, GatewayServer, Shutdown};

pub type DelegateSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Config with two known session tokens and no metrics exporter.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.observability.metrics_enabled = false;
    config.auth_tokens.insert("tok-u1".to_string(), "u1".to_string());
    config.auth_tokens.insert("tok-u2".to_string(), "u2".to_string());
    config
}

/// Start a gateway on an ephemeral port. Returns its address and the
/// shutdown handle keeping it alive.
pub async fn spawn_gateway(config: GatewayConfig) -> (SocketAddr, Arc<Shutdown>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Shutdown::new());
    let server = GatewayServer::new(config).expect("server assembles");
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    (addr, shutdown)
}

/// Open a delegate connection and present the auth frame.
pub async fn connect_delegate(addr: SocketAddr, token: &str) -> DelegateSocket {
    let (mut socket, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/gateway/connect"))
            .await
            .expect("websocket connects");
    send_wire(&mut socket, &WireMessage::Auth { token: token.to_string() }).await;
    socket
}

pub async fn send_wire(socket: &mut DelegateSocket, message: &WireMessage) {
    socket
        .send(WsMessage::Text(message.to_json().into()))
        .await
        .expect("frame sends");
}

/// Next envelope frame, skipping socket-level keepalives. `None` when the
/// gateway closed the connection.
pub async fn next_wire(socket: &mut DelegateSocket) -> Option<WireMessage> {
    loop {
        match socket.next().await? {
            Ok(WsMessage::Text(text)) => {
                return Some(WireMessage::from_json(text.as_str()).expect("valid frame"))
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
            Ok(WsMessage::Close(_)) => return None,
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Next `request` frame, skipping envelope pings.
pub async fn next_request(socket: &mut DelegateSocket) -> (String, String, Vec<(String, String)>) {
    loop {
        match next_wire(socket).await.expect("connection open") {
            WireMessage::Request { request_id, endpoint, params } => {
                return (request_id, endpoint, params)
            }
            WireMessage::Ping { .. } => continue,
            other => panic!("expected request frame, got {other:?}"),
        }
    }
}

pub async fn send_response(
    socket: &mut DelegateSocket,
    request_id: &str,
    success: bool,
    payload: serde_json::Value,
    error: Option<String>,
) {
    send_wire(
        socket,
        &WireMessage::Response {
            request_id: request_id.to_string(),
            success,
            payload: Some(payload),
            error,
        },
    )
    .await;
}

/// Poll `/health` until the gateway reports `expected` connections.
pub async fn wait_for_connections(addr: SocketAddr, expected: usize) {
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(response) = client.get(format!("http://{addr}/health")).send().await {
            if let Ok(body) = response.json::<serde_json::Value>().await {
                if body["connections"].as_u64() == Some(expected as u64) {
                    return;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway never reported {expected} connections");
}

/// A programmable mock upstream; records every request head it sees.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    /// Request heads received so far.
    pub fn seen(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a raw-TCP mock upstream. The closure produces
/// (status, extra headers, body) per request.
pub async fn start_mock_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn() -> (u16, Vec<(&'static str, String)>, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            let (status, headers, body) = respond();
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut head = String::new();
                let mut buf = vec![0u8; 8192];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            head.push_str(&String::from_utf8_lossy(&buf[..n]));
                            if head.contains("\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                seen.lock().unwrap().push(head);

                let mut response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                    status,
                    reason(status),
                    body.len()
                );
                for (name, value) in headers {
                    response.push_str(&format!("{name}: {value}\r\n"));
                }
                response.push_str("\r\n");
                response.push_str(&body);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockUpstream { addr, requests }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
