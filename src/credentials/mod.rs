//! Credential store adapter.
//!
//! The persistent store that owns credentials is an external collaborator;
//! this module defines the read-only port the gateway consumes and an
//! in-memory implementation seeded from config. The gateway never mutates a
//! snapshot — a snapshot may be incomplete, and deciding what to do about
//! that belongs to the router.

pub mod store;

pub use store::{CredentialStore, InMemoryCredentialStore};

use std::collections::BTreeMap;
use std::time::SystemTime;

/// The partial credential set held for one user.
///
/// `cookies` is a sorted map so cookie-header assembly is deterministic.
#[derive(Debug, Clone)]
pub struct CredentialSnapshot {
    /// CSRF token the upstream expects mirrored into a request header.
    pub csrf_token: Option<String>,

    /// Known cookie subset, name → value. May be missing the session
    /// cookies the upstream demands for direct execution.
    pub cookies: BTreeMap<String, String>,

    /// When this snapshot was captured.
    pub captured_at: SystemTime,
}

impl CredentialSnapshot {
    /// A snapshot with the given fields, captured now.
    pub fn new(csrf_token: Option<String>, cookies: BTreeMap<String, String>) -> Self {
        Self {
            csrf_token,
            cookies,
            captured_at: SystemTime::now(),
        }
    }

    /// Whether this snapshot carries everything the server path needs:
    /// a CSRF token plus every cookie named in `required_cookies`.
    pub fn is_sufficient_for(&self, required_cookies: &[String]) -> bool {
        self.csrf_token.is_some()
            && required_cookies.iter().all(|name| self.cookies.contains_key(name))
    }
}
