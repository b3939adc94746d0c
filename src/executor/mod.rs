//! Server-side execution path.
//!
//! Sends a built request directly to the upstream with whatever partial
//! credential set the snapshot carried. Classification of the upstream
//! status lives here; retry policy explicitly does not — callers own that.

pub mod server;

pub use server::ServerExecutor;

use serde_json::Value;

/// A successful (2xx) upstream answer.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    /// Parsed JSON body, or the raw text wrapped in a JSON string when the
    /// upstream returns something that is not JSON.
    pub payload: Value,
}
