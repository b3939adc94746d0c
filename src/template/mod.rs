//! Request template engine.
//!
//! # Responsibilities
//! - Map a logical call (endpoint name + ordered parameters) to a fully
//!   formed outbound request (URL, headers, body)
//! - Guarantee path parity: the same logical call builds the same request
//!   shape whether it executes server-side or in a delegate
//! - Keep construction deterministic: same inputs, byte-identical output
//!
//! # Design Decisions
//! - Endpoint descriptors are a static table; query key order is part of
//!   the descriptor, never derived from caller input
//! - One form-urlencoded serializer does all percent-encoding
//! - Absent credential fields drop their header entirely; no empty-string
//!   placeholders that would change the request shape

pub mod builder;
pub mod endpoint;

pub use builder::{encode_component, TemplateEngine};
pub use endpoint::{EndpointSpec, ENDPOINTS};

use axum::http::Method;

/// A logical call, prior to construction. Immutable once built; serializes
/// to an identical wire request on either execution path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalRequest {
    /// Endpoint identifier, e.g. "feed".
    pub endpoint: String,
    /// Ordered parameter pairs. Order matters: the HTTP API, the wire
    /// envelope, and the builder all preserve it.
    pub params: Vec<(String, String)>,
    /// Target user/session id.
    pub user_id: String,
}

impl LogicalRequest {
    pub fn new(
        endpoint: impl Into<String>,
        params: Vec<(String, String)>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
            user_id: user_id.into(),
        }
    }
}

/// A fully constructed outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltRequest {
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    /// Ordered header list; names are lowercase and the order is fixed.
    pub headers: Vec<(&'static str, String)>,
    /// JSON body for endpoints that carry one.
    pub body: Option<String>,
}
