//! Gateway error taxonomy.
//!
//! Every failure a caller can observe is a variant here. Nothing in this
//! crate panics on a broken connection or a bad upstream answer; errors are
//! returned as typed results and only `Protocol` additionally tears down the
//! offending connection.

use std::time::Duration;

use thiserror::Error;

/// All error outcomes of a gateway call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The logical endpoint name is not in the template table. Programmer
    /// error; never retried.
    #[error("unsupported endpoint: {0}")]
    UnsupportedEndpoint(String),

    /// A parameter name the endpoint descriptor does not know about.
    #[error("invalid parameter {name:?} for endpoint {endpoint:?}")]
    InvalidParameter { endpoint: String, name: String },

    /// Server-side execution was requested but the stored credential
    /// snapshot lacks fields the upstream demands. Detected before any
    /// network I/O; callers should switch to delegated execution.
    #[error("incomplete credentials for user {0}: server path not viable")]
    IncompleteCredentials(String),

    /// Upstream answered 401/403. Almost certainly the partial-cookie case
    /// or an expired session; not retried here.
    #[error("upstream rejected authentication (status {status})")]
    AuthRejected { status: u16 },

    /// Upstream answered 429.
    #[error("upstream rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Upstream answered 5xx. Safe to retry with backoff at the caller's
    /// discretion.
    #[error("upstream error (status {status})")]
    UpstreamError { status: u16 },

    /// Upstream answered a 4xx other than 401/403/429.
    #[error("upstream client error (status {status})")]
    ClientError { status: u16 },

    /// No open delegate connection for the user.
    #[error("no delegate connection for user {0}")]
    NoDelegateAvailable(String),

    /// The delegated call exceeded its deadline. The browser-side call may
    /// still be in flight; a late response is discarded, so duplicate
    /// execution upstream is possible.
    #[error("delegated call timed out after {0:?}")]
    Timeout(Duration),

    /// The delegate connection left the open state before the call resolved.
    #[error("delegate connection dropped mid-call")]
    Disconnected,

    /// The delegate executed the call and reported failure. Carries the
    /// error string from the `response` frame verbatim.
    #[error("delegate reported failure: {message}")]
    DelegateFailed { message: String },

    /// Malformed or unexpected message on a delegate connection. The
    /// connection is torn down; other users are unaffected.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Outbound HTTP transport failure on the server path (DNS, connect,
    /// TLS, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Configuration problem surfaced at startup or on a per-call basis.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Stable lowercase kind tag, used for metrics labels and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::UnsupportedEndpoint(_) => "unsupported_endpoint",
            GatewayError::InvalidParameter { .. } => "invalid_parameter",
            GatewayError::IncompleteCredentials(_) => "incomplete_credentials",
            GatewayError::AuthRejected { .. } => "auth_rejected",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::UpstreamError { .. } => "upstream_error",
            GatewayError::ClientError { .. } => "client_error",
            GatewayError::NoDelegateAvailable(_) => "no_delegate",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Disconnected => "disconnected",
            GatewayError::DelegateFailed { .. } => "delegate_failed",
            GatewayError::Protocol(_) => "protocol",
            GatewayError::Transport(_) => "transport",
            GatewayError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(
            GatewayError::UnsupportedEndpoint("x".into()).kind(),
            "unsupported_endpoint"
        );
        assert_eq!(GatewayError::Disconnected.kind(), "disconnected");
        assert_eq!(
            GatewayError::RateLimited { retry_after: None }.kind(),
            "rate_limited"
        );
    }
}
