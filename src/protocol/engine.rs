//! Per-connection protocol state and the connection run loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::protocol::message::{NotificationLevel, WireMessage};
use crate::template::LogicalRequest;

/// Lifecycle state of a delegate connection.
///
/// `Disconnected` is the terminal state for unexpected transport loss;
/// `Closed` for deliberate teardown (supersede, shutdown, client close).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
    Disconnected,
}

/// Outcome of one delegated call as reported by the peer.
#[derive(Debug, Clone)]
pub struct DelegateReply {
    pub success: bool,
    pub payload: Value,
    pub error: Option<String>,
}

/// Transport seam between the protocol engine and whatever carries frames.
///
/// Production implementation wraps the axum WebSocket; tests use a
/// channel-backed double. The engine is the only writer.
#[async_trait]
pub trait DelegateTransport: Send {
    async fn send(&mut self, message: WireMessage) -> Result<(), GatewayError>;

    /// Next inbound frame. `None` means the peer closed the transport.
    async fn recv(&mut self) -> Option<Result<WireMessage, GatewayError>>;

    async fn close(&mut self);
}

/// Liveness timing, decoupled from the config's second granularity so
/// tests can run on millisecond schedules.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTiming {
    pub ping_interval: Duration,
    pub pong_window: Duration,
}

impl From<&ConnectionConfig> for ConnectionTiming {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            pong_window: Duration::from_secs(config.pong_timeout_secs),
        }
    }
}

/// Receiver half of a connection's plumbing, consumed by [`run_connection`].
pub struct ConnectionDriver {
    outbound_rx: mpsc::Receiver<WireMessage>,
    close_rx: watch::Receiver<bool>,
}

/// Shared per-connection state: the pending-call table, correlation id
/// counter, outbound queue and lifecycle flag.
///
/// The pending table is owned exclusively by this handle; teardown is total
/// (drain on any exit path) so nothing leaks across connections.
pub struct ConnectionHandle {
    user_id: String,
    id: Uuid,
    state: Mutex<ConnectionState>,
    outbound_tx: mpsc::Sender<WireMessage>,
    pending: Mutex<HashMap<String, oneshot::Sender<DelegateReply>>>,
    next_correlation: AtomicU64,
    next_ping: AtomicU64,
    last_pong: Mutex<Instant>,
    close_tx: watch::Sender<bool>,
}

impl ConnectionHandle {
    /// Create the handle plus the driver half for the run loop.
    pub fn new(user_id: impl Into<String>, outbound_queue: usize) -> (Arc<Self>, ConnectionDriver) {
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_queue);
        let (close_tx, close_rx) = watch::channel(false);
        let handle = Arc::new(Self {
            user_id: user_id.into(),
            id: Uuid::new_v4(),
            state: Mutex::new(ConnectionState::Connecting),
            outbound_tx,
            pending: Mutex::new(HashMap::new()),
            next_correlation: AtomicU64::new(1),
            next_ping: AtomicU64::new(1),
            last_pong: Mutex::new(Instant::now()),
            close_tx,
        });
        (handle, ConnectionDriver { outbound_rx, close_rx })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock")
    }

    /// Transition `Connecting → Open` once the handshake has completed and
    /// the connection is registered as the user's authoritative one.
    pub fn mark_open(&self) {
        let mut state = self.state.lock().expect("state lock");
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Open;
        }
    }

    /// Number of outstanding delegated calls.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().expect("pending lock").len()
    }

    /// Dispatch a delegated call and suspend the caller until the matching
    /// response arrives, the deadline elapses, or the connection leaves the
    /// open state — whichever happens first.
    pub async fn delegate(
        &self,
        request: &LogicalRequest,
        timeout: Duration,
    ) -> Result<DelegateReply, GatewayError> {
        if self.state() != ConnectionState::Open {
            return Err(GatewayError::Disconnected);
        }

        let correlation = self.next_correlation.fetch_add(1, Ordering::Relaxed).to_string();
        let (slot_tx, mut slot_rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending lock")
            .insert(correlation.clone(), slot_tx);

        let frame = WireMessage::Request {
            request_id: correlation.clone(),
            endpoint: request.endpoint.clone(),
            params: request.params.clone(),
        };
        if self.outbound_tx.send(frame).await.is_err() {
            // Run loop is gone; nothing will ever resolve the slot.
            self.pending.lock().expect("pending lock").remove(&correlation);
            return Err(GatewayError::Disconnected);
        }

        tracing::debug!(
            user_id = %self.user_id,
            connection_id = %self.id,
            request_id = %correlation,
            endpoint = %request.endpoint,
            "delegated call dispatched"
        );

        tokio::select! {
            resolved = &mut slot_rx => match resolved {
                Ok(reply) => Ok(reply),
                // Slot sender dropped without a value: bulk failure on
                // disconnect or close.
                Err(_) => Err(GatewayError::Disconnected),
            },
            _ = tokio::time::sleep(timeout) => {
                let removed = self
                    .pending
                    .lock()
                    .expect("pending lock")
                    .remove(&correlation)
                    .is_some();
                if removed {
                    tracing::debug!(
                        user_id = %self.user_id,
                        request_id = %correlation,
                        "delegated call deadline elapsed"
                    );
                    Err(GatewayError::Timeout(timeout))
                } else {
                    // The read loop resolved the slot between the deadline
                    // firing and the table lock; take the reply.
                    match slot_rx.try_recv() {
                        Ok(reply) => Ok(reply),
                        Err(_) => Err(GatewayError::Timeout(timeout)),
                    }
                }
            }
        }
    }

    /// Fire-and-forget notification to the delegate.
    pub async fn notify(
        &self,
        message: impl Into<String>,
        level: NotificationLevel,
    ) -> Result<(), GatewayError> {
        if self.state() != ConnectionState::Open {
            return Err(GatewayError::Disconnected);
        }
        let frame = WireMessage::Notification { message: message.into(), level };
        self.outbound_tx
            .send(frame)
            .await
            .map_err(|_| GatewayError::Disconnected)
    }

    /// Resolve the pending call for `request_id`. Returns false when no
    /// such call is outstanding (late or unknown response).
    fn resolve(&self, request_id: &str, reply: DelegateReply) -> bool {
        let slot = self.pending.lock().expect("pending lock").remove(request_id);
        match slot {
            Some(sender) => sender.send(reply).is_ok(),
            None => false,
        }
    }

    /// Fail every outstanding call. Dropping the slot senders resolves each
    /// suspended caller with `Disconnected` in one scheduling step.
    fn fail_all_pending(&self) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock().expect("pending lock");
            pending.drain().collect()
        };
        if !drained.is_empty() {
            tracing::info!(
                user_id = %self.user_id,
                connection_id = %self.id,
                failed_calls = drained.len(),
                "failing outstanding delegated calls"
            );
        }
    }

    /// Ask the run loop to shut the connection down. Pending calls fail
    /// immediately; the loop finalizes the state to `Closed`.
    pub fn request_close(&self) {
        {
            let mut state = self.state.lock().expect("state lock");
            if matches!(*state, ConnectionState::Closed | ConnectionState::Disconnected) {
                return;
            }
            *state = ConnectionState::Closing;
        }
        self.fail_all_pending();
        let _ = self.close_tx.send(true);
    }

    fn finalize(&self, terminal: ConnectionState) {
        {
            let mut state = self.state.lock().expect("state lock");
            if matches!(*state, ConnectionState::Closed | ConnectionState::Disconnected) {
                return;
            }
            *state = terminal;
        }
        self.fail_all_pending();
    }

    fn mark_pong(&self) {
        *self.last_pong.lock().expect("pong lock") = Instant::now();
    }

    fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().expect("pong lock").elapsed()
    }

    fn next_ping_id(&self) -> u64 {
        self.next_ping.fetch_add(1, Ordering::Relaxed)
    }
}

/// Unix time in milliseconds, for gateway-originated pongs.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Drive one connection until it closes: forward outbound frames, dispatch
/// inbound ones, enforce pong liveness.
///
/// The loop never suspends on a pending call — a slow delegated call only
/// parks its own caller while frames keep draining here. Returns the
/// terminal state for the caller to log.
pub async fn run_connection<T: DelegateTransport>(
    handle: Arc<ConnectionHandle>,
    mut driver: ConnectionDriver,
    mut transport: T,
    timing: ConnectionTiming,
) -> ConnectionState {
    let mut ping_timer = tokio::time::interval_at(
        tokio::time::Instant::now() + timing.ping_interval,
        timing.ping_interval,
    );
    ping_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    handle.mark_pong();

    let terminal = loop {
        tokio::select! {
            _ = driver.close_rx.changed() => {
                break ConnectionState::Closed;
            }
            outbound = driver.outbound_rx.recv() => match outbound {
                Some(frame) => {
                    if transport.send(frame).await.is_err() {
                        break ConnectionState::Disconnected;
                    }
                }
                None => break ConnectionState::Closed,
            },
            inbound = transport.recv() => match inbound {
                Some(Ok(frame)) => {
                    if let Err(violation) = handle_frame(&handle, &mut transport, frame).await {
                        tracing::warn!(
                            user_id = %handle.user_id(),
                            connection_id = %handle.id(),
                            violation = %violation,
                            "protocol violation; tearing connection down"
                        );
                        metrics::record_protocol_violation();
                        let _ = transport
                            .send(WireMessage::Error { message: violation, code: None })
                            .await;
                        break ConnectionState::Disconnected;
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(
                        user_id = %handle.user_id(),
                        connection_id = %handle.id(),
                        error = %err,
                        "transport error"
                    );
                    break ConnectionState::Disconnected;
                }
                None => break ConnectionState::Disconnected,
            },
            _ = ping_timer.tick() => {
                if handle.last_pong_elapsed() > timing.pong_window {
                    tracing::warn!(
                        user_id = %handle.user_id(),
                        connection_id = %handle.id(),
                        "liveness window elapsed without pong"
                    );
                    break ConnectionState::Disconnected;
                }
                let ping = WireMessage::Ping { id: Some(handle.next_ping_id()) };
                if transport.send(ping).await.is_err() {
                    break ConnectionState::Disconnected;
                }
            }
        }
    };

    handle.finalize(terminal);
    transport.close().await;
    tracing::info!(
        user_id = %handle.user_id(),
        connection_id = %handle.id(),
        state = ?terminal,
        "connection finished"
    );
    terminal
}

/// Dispatch one inbound frame. An `Err` is a protocol violation and tears
/// the connection down.
async fn handle_frame<T: DelegateTransport>(
    handle: &Arc<ConnectionHandle>,
    transport: &mut T,
    frame: WireMessage,
) -> Result<(), String> {
    match frame {
        WireMessage::Response { request_id, success, payload, error } => {
            let reply = DelegateReply {
                success,
                payload: payload.unwrap_or(Value::Null),
                error,
            };
            if !handle.resolve(&request_id, reply) {
                tracing::debug!(
                    user_id = %handle.user_id(),
                    connection_id = %handle.id(),
                    request_id = %request_id,
                    "discarding late or unknown response"
                );
                metrics::record_late_response();
            }
            Ok(())
        }
        WireMessage::Pong { .. } => {
            handle.mark_pong();
            Ok(())
        }
        WireMessage::Ping { id } => {
            // Inbound pings also prove the peer is alive.
            handle.mark_pong();
            let pong = WireMessage::Pong { id, server_time: Some(now_millis()) };
            transport.send(pong).await.map_err(|e| e.to_string())
        }
        WireMessage::Error { message, code } => {
            tracing::warn!(
                user_id = %handle.user_id(),
                connection_id = %handle.id(),
                code = ?code,
                "delegate reported error: {message}"
            );
            Ok(())
        }
        WireMessage::Auth { .. } => Err("auth frame after handshake".to_string()),
        WireMessage::Request { .. } => Err("request frame from delegate".to_string()),
        WireMessage::Notification { .. } => Err("notification frame from delegate".to_string()),
    }
}
