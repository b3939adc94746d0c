//! Correlation protocol engine.
//!
//! # Responsibilities
//! - Define the wire envelope spoken on delegate connections
//! - Multiplex many concurrent delegated calls over one connection using
//!   correlation ids
//! - Enforce liveness (ping/pong) and fail pending calls on disconnect
//!
//! # Data Flow
//! ```text
//! caller ──delegate()──▶ pending table ──request frame──▶ delegate peer
//!                            ▲                                  │
//!                            └────────── response frame ◀───────┘
//!        (read loop matches correlation id, resolves the caller's slot)
//! ```
//!
//! # Design Decisions
//! - One writer per connection: every outbound frame funnels through a
//!   bounded mpsc channel into the run loop
//! - Responses may arrive in any order; the correlation id is the only
//!   ordering key
//! - A delegated call suspends its caller only, never the run loop
//! - Exactly one of {matching response, caller deadline, disconnect}
//!   resolves a pending call; late responses are discarded and logged

pub mod engine;
pub mod message;

pub use engine::{
    run_connection, ConnectionDriver, ConnectionHandle, ConnectionState, ConnectionTiming,
    DelegateReply, DelegateTransport,
};
pub use message::{NotificationLevel, WireMessage};
