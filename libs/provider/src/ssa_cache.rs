//! SSA desired-state cache (§4.4): maps a manifest fingerprint to the last
//! extracted server-side-apply view, so unchanged Objects don't repeat an
//! SSA dry-run on every reconcile.

use std::collections::HashMap;
use std::sync::Mutex;

use kube::api::DynamicObject;
use sha2::{Digest, Sha256};

/// A deterministic hash over everything that affects SSA defaulting. For
/// this provider that's only the raw manifest bytes (§4.4).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of_manifest(raw: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(raw);
        Fingerprint(hasher.finalize().into())
    }
}

/// Cache entry: `None` means a cache-invalidating error occurred on the last
/// attempt to populate this fingerprint (§4.4) — callers should re-run the
/// dry-run rather than treat this as "no drift".
type Entry = Option<DynamicObject>;

/// Process-wide cache of fingerprint -> extracted SSA-owned view. Entries
/// needing field-manager upgrade (§4.5.1) are never inserted here.
#[derive(Default)]
pub struct SsaCache {
    entries: Mutex<HashMap<Fingerprint, Entry>>,
}

impl SsaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Entry> {
        self.entries
            .lock()
            .expect("ssa cache mutex poisoned")
            .get(fingerprint)
            .cloned()
    }

    pub fn insert(&self, fingerprint: Fingerprint, extracted: Option<DynamicObject>) {
        self.entries
            .lock()
            .expect("ssa cache mutex poisoned")
            .insert(fingerprint, extracted);
    }

    /// Drops a fingerprint's entry, forcing the next lookup to miss and
    /// re-run the dry-run (§4.4, invalidate on manifest change or
    /// field-manager upgrade).
    pub fn invalidate(&self, fingerprint: &Fingerprint) {
        self.entries
            .lock()
            .expect("ssa cache mutex poisoned")
            .remove(fingerprint);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("ssa cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_identical_bytes() {
        let a = Fingerprint::of_manifest(b"{\"kind\":\"ConfigMap\"}");
        let b = Fingerprint::of_manifest(b"{\"kind\":\"ConfigMap\"}");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_different_bytes() {
        let a = Fingerprint::of_manifest(b"{\"kind\":\"ConfigMap\"}");
        let b = Fingerprint::of_manifest(b"{\"kind\":\"Secret\"}");
        assert_ne!(a, b);
    }

    /// Invariant 4: two reconciles with identical manifest bytes issue at
    /// most one SSA dry-run, unless an error invalidates the entry.
    #[test]
    fn invariant_cache_avoids_repeat_dry_run() {
        let cache = SsaCache::new();
        let fp = Fingerprint::of_manifest(b"{\"kind\":\"ConfigMap\"}");

        assert!(cache.get(&fp).is_none(), "first lookup is a miss");
        cache.insert(fp, None);
        assert!(
            cache.get(&fp).is_some(),
            "second lookup hits without a dry-run"
        );
    }

    #[test]
    fn invalidate_forces_a_miss() {
        let cache = SsaCache::new();
        let fp = Fingerprint::of_manifest(b"{\"kind\":\"ConfigMap\"}");
        cache.insert(fp, None);
        cache.invalidate(&fp);
        assert!(cache.get(&fp).is_none());
    }
}
