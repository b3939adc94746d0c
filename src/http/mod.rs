//! HTTP and WebSocket surface.
//!
//! # Responsibilities
//! - Expose the backend-facing API (`/api/execute`, `/api/notify`,
//!   `/health`)
//! - Accept delegate connections on `/gateway/connect` and hand them to
//!   the protocol engine after the auth handshake
//! - Map gateway errors onto HTTP statuses

pub mod api;
pub mod auth;
pub mod server;
pub mod ws;

pub use server::{AppState, GatewayServer};
