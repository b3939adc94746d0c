//! Static endpoint descriptor table.
//!
//! Each descriptor fixes everything about an endpoint's request shape that
//! is not caller data: HTTP method, path, the exact order of query keys,
//! and which fields travel in the JSON body. The upstream fingerprints
//! request shape, so none of this may vary between calls.

use axum::http::Method;

/// Descriptor for one supported endpoint.
#[derive(Debug)]
pub struct EndpointSpec {
    /// Logical name callers use.
    pub name: &'static str,
    pub method: Method,
    /// Path under the upstream base URL.
    pub path: &'static str,
    /// Query keys in emission order. Keys absent from the call are omitted;
    /// present keys always appear in this order.
    pub query_order: &'static [&'static str],
    /// Fields that travel in the JSON body instead of the query.
    pub body_fields: &'static [&'static str],
}

/// All supported endpoints.
pub static ENDPOINTS: &[EndpointSpec] = &[
    EndpointSpec {
        name: "feed",
        method: Method::GET,
        path: "/api/feed/updates",
        query_order: &["count", "start"],
        body_fields: &[],
    },
    EndpointSpec {
        name: "comments",
        method: Method::GET,
        path: "/api/feed/comments",
        query_order: &["updateId", "count", "start"],
        body_fields: &[],
    },
    EndpointSpec {
        name: "profile",
        method: Method::GET,
        path: "/api/identity/profile",
        query_order: &["memberId"],
        body_fields: &[],
    },
    EndpointSpec {
        name: "search",
        method: Method::GET,
        path: "/api/search/blended",
        query_order: &["keywords", "origin", "count", "start"],
        body_fields: &[],
    },
    EndpointSpec {
        name: "reactions",
        method: Method::POST,
        path: "/api/feed/reactions",
        query_order: &["updateId"],
        body_fields: &["reactionType"],
    },
    EndpointSpec {
        name: "messaging",
        method: Method::POST,
        path: "/api/messaging/conversations",
        query_order: &[],
        body_fields: &["recipientId", "body"],
    },
];

/// Look up a descriptor by logical name.
pub fn lookup(name: &str) -> Option<&'static EndpointSpec> {
    ENDPOINTS.iter().find(|spec| spec.name == name)
}

impl EndpointSpec {
    /// Whether `param` is a known query or body field of this endpoint.
    pub fn knows_param(&self, param: &str) -> bool {
        self.query_order.contains(&param) || self.body_fields.contains(&param)
    }
}
