//! Connection registry.
//!
//! # Responsibilities
//! - Track at most one authoritative delegate connection per user
//! - Supersede a stale connection when the same user reconnects
//! - Hand the router the live handle (or absence) for a user
//!
//! # Design Decisions
//! - A register for a user always wins: the previous connection moves to
//!   Closing and its pending calls fail immediately
//! - Deregister compares connection ids so a superseded connection's
//!   cleanup cannot evict its replacement
//! - No per-call state lives here; contention stays low

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::observability::metrics;
use crate::protocol::ConnectionHandle;
use crate::protocol::ConnectionState;

/// Shared map of user id → authoritative connection handle.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handle` the authoritative connection for its user. Any
    /// previous connection is told to close and its pending calls fail.
    pub fn register(&self, handle: Arc<ConnectionHandle>) {
        let user_id = handle.user_id().to_string();
        let previous = self.connections.insert(user_id.clone(), handle);
        if let Some(stale) = previous {
            tracing::info!(
                user_id = %user_id,
                superseded = %stale.id(),
                "new connection supersedes existing one"
            );
            stale.request_close();
        }
        metrics::set_active_connections(self.connections.len());
    }

    /// The user's open connection, if any. Connections that have left the
    /// open state are treated as absent.
    pub fn lookup(&self, user_id: &str) -> Option<Arc<ConnectionHandle>> {
        self.connections
            .get(user_id)
            .map(|entry| entry.value().clone())
            .filter(|handle| handle.state() == ConnectionState::Open)
    }

    /// Remove a connection when its run loop finishes. A superseded
    /// connection's cleanup leaves the replacement in place.
    pub fn deregister(&self, user_id: &str, connection_id: Uuid) {
        self.connections
            .remove_if(user_id, |_, handle| handle.id() == connection_id);
        metrics::set_active_connections(self.connections.len());
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Close every connection. Used on shutdown: pending calls fail and
    /// each run loop winds down.
    pub fn drain(&self) {
        for entry in self.connections.iter() {
            entry.value().request_close();
        }
        self.connections.clear();
        metrics::set_active_connections(0);
    }
}
