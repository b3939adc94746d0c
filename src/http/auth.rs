//! Session authentication for delegate connections.
//!
//! The first frame on a connection must be `auth{token}`; this port turns
//! the token into a user id. Minting tokens (the login flow) lives outside
//! the gateway.

use std::collections::BTreeMap;

/// Validates auth tokens to user ids.
pub trait SessionAuthenticator: Send + Sync {
    /// The user id the token belongs to, or `None` for an unknown token.
    fn authenticate(&self, token: &str) -> Option<String>;
}

/// Token table from config: token → user id.
#[derive(Debug, Default)]
pub struct StaticTokenAuthenticator {
    tokens: BTreeMap<String, String>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl SessionAuthenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Option<String> {
        self.tokens.get(token).cloned()
    }
}
