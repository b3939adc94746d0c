//! Credential store port and the in-memory implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::schema::CredentialSeed;
use crate::credentials::CredentialSnapshot;

/// Read-only access to per-user credential snapshots.
///
/// Implementations own the data; the gateway only ever reads it.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The current snapshot for a user, or `None` if nothing is stored.
    async fn snapshot(&self, user_id: &str) -> Option<CredentialSnapshot>;
}

/// In-memory credential store, seeded from config at startup.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: Arc<DashMap<String, CredentialSnapshot>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from config seeds.
    pub fn from_seeds(seeds: &BTreeMap<String, CredentialSeed>) -> Self {
        let store = Self::new();
        for (user_id, seed) in seeds {
            store.upsert(
                user_id.clone(),
                CredentialSnapshot::new(seed.csrf_token.clone(), seed.cookies.clone()),
            );
        }
        store
    }

    /// Insert or replace a user's snapshot.
    pub fn upsert(&self, user_id: String, snapshot: CredentialSnapshot) {
        self.inner.insert(user_id, snapshot);
    }

    /// Drop a user's snapshot.
    pub fn remove(&self, user_id: &str) {
        self.inner.remove(user_id);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn snapshot(&self, user_id: &str) -> Option<CredentialSnapshot> {
        self.inner.get(user_id).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_roundtrip() {
        let store = InMemoryCredentialStore::new();
        assert!(store.snapshot("alice").await.is_none());

        let mut cookies = BTreeMap::new();
        cookies.insert("session_id".to_string(), "s-1".to_string());
        store.upsert("alice".into(), CredentialSnapshot::new(Some("tok".into()), cookies));

        let snap = store.snapshot("alice").await.unwrap();
        assert_eq!(snap.csrf_token.as_deref(), Some("tok"));
        assert_eq!(snap.cookies.get("session_id").unwrap(), "s-1");

        store.remove("alice");
        assert!(store.snapshot("alice").await.is_none());
    }

    #[tokio::test]
    async fn from_seeds_loads_config_entries() {
        let mut seeds = BTreeMap::new();
        seeds.insert(
            "bob".to_string(),
            CredentialSeed {
                csrf_token: Some("ajax:42".into()),
                cookies: BTreeMap::from([("session_id".to_string(), "sid".to_string())]),
            },
        );

        let store = InMemoryCredentialStore::from_seeds(&seeds);
        let snap = store.snapshot("bob").await.unwrap();
        assert_eq!(snap.csrf_token.as_deref(), Some("ajax:42"));
    }
}
