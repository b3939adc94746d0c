//! Dual-path execution gateway.
//!
//! Issues calls against a cookie-authenticated third-party web API on
//! behalf of users, over one of two paths that build byte-identical
//! requests:
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │              EXECUTION GATEWAY               │
//!   backend caller       │                                              │
//!   ────POST /api/execute┼─▶ router ──┬─▶ executor ── HTTP ─────────────┼─▶ upstream API
//!                        │   (policy) │   (partial credentials)         │
//!                        │            │                                 │
//!                        │            └─▶ protocol engine ── WebSocket ─┼─▶ user's browser
//!                        │                (correlation ids,             │   (full cookie jar)
//!                        │                 pending-call table)          │
//!                        │                                              │
//!                        │  template engine: both paths share one       │
//!                        │  deterministic request builder               │
//!                        └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod http;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod template;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use router::{CallOutcome, ExecutionGateway, ExecutionPolicy};
