//! Process-wide cache of per-`ProviderConfig` clients (§4.1).
//!
//! Entries are immutable once inserted: once a reader has the `Client` out of
//! the mutex it needs no further synchronization, matching the concurrency
//! model in spec.md §5 ("entries are immutable once inserted, so readers
//! after unlock need no further synchronization").

use kube::Client;
use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
    sync::Mutex,
    time::Instant,
};

/// Hash of a canonicalized `ProviderConfig` spec, used as the cache key.
/// Callers compute this themselves (typically by hashing the JSON-serialized
/// spec) so this crate stays decoupled from the CRD types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CacheKey(pub u64);

impl CacheKey {
    pub fn from_spec<T: serde::Serialize>(spec: &T) -> Self {
        let bytes = serde_json::to_vec(spec).unwrap_or_default();
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        bytes.hash(&mut hasher);
        CacheKey(hasher.finish())
    }
}

struct Entry {
    client: Client,
    expires_at: Option<Instant>,
}

/// A `Mutex`-guarded map from [`CacheKey`] to cached [`Client`]s, with
/// optional per-entry TTL for providers that hand out expiring tokens
/// (Gardener admin kubeconfigs, cloud STS tokens).
#[derive(Default)]
pub struct ConnectionCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached client for `key` if present and not expired. An
    /// expired entry is removed as a side effect so the next lookup (by any
    /// caller) rebuilds it.
    pub fn get(&self, key: CacheKey) -> Option<Client> {
        let mut entries = self.entries.lock().expect("connection cache poisoned");
        match entries.get(&key) {
            Some(entry) => {
                if entry.expires_at.is_some_and(|at| at <= Instant::now()) {
                    entries.remove(&key);
                    None
                } else {
                    Some(entry.client.clone())
                }
            }
            None => None,
        }
    }

    /// Inserts or replaces the cached client for `key`, with an optional
    /// expiry for upstreams that return one.
    pub fn insert(&self, key: CacheKey, client: Client, expires_at: Option<Instant>) {
        let mut entries = self.entries.lock().expect("connection cache poisoned");
        entries.insert(key, Entry { client, expires_at });
    }

    /// Number of live (not necessarily unexpired) entries; exposed for tests
    /// and diagnostics only.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("connection cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fake_client() -> Client {
        // `Client::new` only needs a `tower::Service`; the mock service never
        // gets called in these cache-only tests.
        let (service, _handle) =
            tower_test::mock::pair::<http::Request<kube::client::Body>, http::Response<kube::client::Body>>();
        Client::new(service, "default")
    }

    #[test]
    fn insert_then_get_returns_clone() {
        let cache = ConnectionCache::new();
        let key = CacheKey(42);
        cache.insert(key, fake_client(), None);
        assert!(cache.get(key).is_some());
    }

    #[test]
    fn expired_entry_is_evicted_on_lookup() {
        let cache = ConnectionCache::new();
        let key = CacheKey(7);
        let expires_at = Instant::now() - Duration::from_secs(1);
        cache.insert(key, fake_client(), Some(expires_at));
        assert!(cache.get(key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_key_returns_none() {
        let cache = ConnectionCache::new();
        assert!(cache.get(CacheKey(1)).is_none());
    }
}
