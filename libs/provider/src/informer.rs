//! Informer registry (§4.7): one running watch per `(ProviderConfigIdentity,
//! GroupVersionKind)`, reference-counted by the Objects that currently care
//! about it, garbage collected once nothing references it any more.
//!
//! The actual `kube::runtime::watcher` plumbing (building the stream,
//! spawning the task, wiring its events into [`Registry::on_event`]) is glue
//! code the embedding binary provides via the `start` closure passed to
//! [`Registry::new`] — this module owns only the state machine: which
//! informers exist, who depends on them, and when they're safe to cancel.
//! That's also what makes invariant 5 (informer GC) directly testable
//! without a real API server.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use kube::core::GroupVersionKind;
use tokio::task::JoinHandle;

/// `None` for the control plane itself, `Some(identity)` for a remote
/// cluster addressed through a `ProviderConfig` (§4.1, §4.7).
pub type ProviderConfigIdentity = Option<String>;

/// What one informer watches.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct InformerKey {
    pub provider_config_identity: ProviderConfigIdentity,
    pub gvk: GroupVersionKind,
}

/// A concrete remote resource an Object touches, for event-to-reconcile
/// dispatch (§4.7 `resourceRefs`) — finer-grained than [`InformerKey`],
/// which only identifies the watch itself.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ResourceRef {
    pub provider_config_identity: ProviderConfigIdentity,
    pub namespace: Option<String>,
    pub name: String,
    pub gvk: GroupVersionKind,
}

/// Identifies the Object whose interest is being recorded. `namespace` is
/// `None` for the cluster-scoped `Object` kind.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ObjectId {
    pub namespace: Option<String>,
    pub name: String,
}

struct Entry {
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<InformerKey, Entry>,
    refs_by_key: HashMap<InformerKey, HashSet<ObjectId>>,
    keys_by_object: HashMap<ObjectId, HashSet<InformerKey>>,
    refs_by_resource: HashMap<ResourceRef, HashSet<ObjectId>>,
    resources_by_object: HashMap<ObjectId, HashSet<ResourceRef>>,
}

/// Type-erased `start` closure, so a concrete `Registry<StartFn>` can live
/// behind `Context` without making `Context` itself generic.
pub type StartFn = Box<dyn Fn(&InformerKey) -> JoinHandle<()> + Send + Sync>;

/// `F` starts the informer task for a key and returns its `JoinHandle`,
/// which [`Registry`] aborts on GC (§4.7 "not automatically recreated").
pub struct Registry<F> {
    inner: RwLock<Inner>,
    start: F,
}

impl<F> Registry<F>
where
    F: Fn(&InformerKey) -> JoinHandle<()>,
{
    pub fn new(start: F) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            start,
        }
    }

    /// `WatchResources(pc, GVKs...)` (§4.7): ensures an informer is running
    /// for every key in `informer_keys`, starting any that are missing via
    /// double-checked locking, and records `object`'s current interest in
    /// both `informer_keys` (GC) and `resource_refs` (event dispatch).
    pub fn watch_resources(
        &self,
        object: ObjectId,
        informer_keys: Vec<InformerKey>,
        resource_refs: Vec<ResourceRef>,
    ) {
        let missing: Vec<InformerKey> = {
            let guard = self.inner.read().expect("informer registry poisoned");
            informer_keys
                .iter()
                .filter(|k| !guard.entries.contains_key(*k))
                .cloned()
                .collect()
        };

        if !missing.is_empty() {
            let mut guard = self.inner.write().expect("informer registry poisoned");
            for key in missing {
                // Second lookup under the exclusive lock defeats the race
                // where another writer started this key between our read
                // unlock and this write lock.
                guard.entries.entry(key.clone()).or_insert_with(|| Entry {
                    handle: (self.start)(&key),
                });
            }
        }

        let mut guard = self.inner.write().expect("informer registry poisoned");

        let new_keys: HashSet<InformerKey> = informer_keys.into_iter().collect();
        let previous_keys = guard.keys_by_object.remove(&object).unwrap_or_default();
        for stale in previous_keys.difference(&new_keys) {
            if let Some(set) = guard.refs_by_key.get_mut(stale) {
                set.remove(&object);
            }
        }
        for key in &new_keys {
            guard.refs_by_key.entry(key.clone()).or_default().insert(object.clone());
        }
        guard.keys_by_object.insert(object.clone(), new_keys);

        let new_resources: HashSet<ResourceRef> = resource_refs.into_iter().collect();
        let previous_resources = guard.resources_by_object.remove(&object).unwrap_or_default();
        for stale in previous_resources.difference(&new_resources) {
            if let Some(set) = guard.refs_by_resource.get_mut(stale) {
                set.remove(&object);
            }
        }
        for resource in &new_resources {
            guard
                .refs_by_resource
                .entry(resource.clone())
                .or_default()
                .insert(object.clone());
        }
        guard.resources_by_object.insert(object, new_resources);
    }

    /// The periodic GC pass (§4.7, invariant 5): cancels and removes every
    /// informer no Object currently indexes, returning the keys it removed.
    pub fn garbage_collect(&self) -> Vec<InformerKey> {
        let mut guard = self.inner.write().expect("informer registry poisoned");
        let stale: Vec<InformerKey> = guard
            .entries
            .keys()
            .filter(|key| guard.refs_by_key.get(*key).map_or(true, HashSet::is_empty))
            .cloned()
            .collect();
        for key in &stale {
            if let Some(entry) = guard.entries.remove(key) {
                entry.handle.abort();
            }
            guard.refs_by_key.remove(key);
        }
        stale
    }

    /// Looks up which Objects touch `resource`, for an event handler to
    /// enqueue (still filtering on `spec.watch=true` itself, since the
    /// registry doesn't carry Object specs).
    pub fn on_event(&self, resource: &ResourceRef, enqueue: &mut dyn FnMut(ObjectId)) {
        let guard = self.inner.read().expect("informer registry poisoned");
        if let Some(objects) = guard.refs_by_resource.get(resource) {
            for object in objects {
                enqueue(object.clone());
            }
        }
    }

    pub fn informer_count(&self) -> usize {
        self.inner.read().expect("informer registry poisoned").entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn gvk(kind: &str) -> GroupVersionKind {
        GroupVersionKind::gvk("", "v1", kind)
    }

    fn object(name: &str) -> ObjectId {
        ObjectId {
            namespace: None,
            name: name.to_string(),
        }
    }

    fn counting_registry() -> (Registry<impl Fn(&InformerKey) -> JoinHandle<()>>, Arc<AtomicUsize>) {
        let starts = Arc::new(AtomicUsize::new(0));
        let counter = starts.clone();
        let registry = Registry::new(move |_key| {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async {})
        });
        (registry, starts)
    }

    #[tokio::test]
    async fn watch_resources_starts_missing_informers_once() {
        let (registry, starts) = counting_registry();
        let key = InformerKey {
            provider_config_identity: None,
            gvk: gvk("ConfigMap"),
        };

        registry.watch_resources(object("a"), vec![key.clone()], vec![]);
        assert_eq!(registry.informer_count(), 1);
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        // A second Object referencing the same GVK must not start a second
        // informer (double-checked locking dedup).
        registry.watch_resources(object("b"), vec![key], vec![]);
        assert_eq!(registry.informer_count(), 1);
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    /// Invariant 5: once the last Object referencing `(pc, GVK)` drops its
    /// interest, the next GC pass removes that informer.
    #[tokio::test]
    async fn invariant_gc_removes_unreferenced_informer() {
        let (registry, _starts) = counting_registry();
        let key = InformerKey {
            provider_config_identity: None,
            gvk: gvk("ConfigMap"),
        };

        registry.watch_resources(object("a"), vec![key.clone()], vec![]);
        assert_eq!(registry.informer_count(), 1);

        assert!(registry.garbage_collect().is_empty(), "still referenced, not yet collectible");
        assert_eq!(registry.informer_count(), 1);

        registry.watch_resources(object("a"), vec![], vec![]);
        let collected = registry.garbage_collect();
        assert_eq!(collected, vec![key]);
        assert_eq!(registry.informer_count(), 0);
    }

    #[tokio::test]
    async fn gc_keeps_informer_referenced_by_a_second_object() {
        let (registry, _starts) = counting_registry();
        let key = InformerKey {
            provider_config_identity: None,
            gvk: gvk("ConfigMap"),
        };

        registry.watch_resources(object("a"), vec![key.clone()], vec![]);
        registry.watch_resources(object("b"), vec![key.clone()], vec![]);
        registry.watch_resources(object("a"), vec![], vec![]);

        assert!(registry.garbage_collect().is_empty());
        assert_eq!(registry.informer_count(), 1);
    }

    #[tokio::test]
    async fn on_event_dispatches_to_interested_objects_only() {
        let (registry, _starts) = counting_registry();
        let touched = ResourceRef {
            provider_config_identity: None,
            namespace: Some("ns".to_string()),
            name: "secret-a".to_string(),
            gvk: gvk("Secret"),
        };
        let untouched = ResourceRef {
            namespace: Some("ns".to_string()),
            name: "secret-b".to_string(),
            ..touched.clone()
        };

        registry.watch_resources(
            object("a"),
            vec![InformerKey {
                provider_config_identity: None,
                gvk: gvk("Secret"),
            }],
            vec![touched.clone()],
        );

        let mut enqueued = Vec::new();
        registry.on_event(&touched, &mut |id| enqueued.push(id));
        assert_eq!(enqueued, vec![object("a")]);

        let mut enqueued = Vec::new();
        registry.on_event(&untouched, &mut |id| enqueued.push(id));
        assert!(enqueued.is_empty());
    }
}
