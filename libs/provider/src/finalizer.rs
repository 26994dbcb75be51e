//! Finalizer add/remove helpers.
//!
//! The generic managed-resource runtime (out of scope, §1) normally drives
//! finalizer lifecycle itself via `kube::runtime::finalizer::finalizer`;
//! these helpers exist for this repo's own `controller::object` reconciler
//! and its tests, which drive the finalizer directly instead.

use kube::{
    api::{Api, Patch, PatchParams},
    Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

pub const FINALIZER: &str = "finalizer.managedresource.crossplane.io";

/// Adds [`FINALIZER`] to `name` if it isn't already present.
pub async fn add<K>(api: &Api<K>, name: &str) -> kube::Result<K>
where
    K: Clone + Debug + DeserializeOwned + Resource + Serialize,
{
    let patch = serde_json::json!({ "metadata": { "finalizers": [FINALIZER] } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await
}

/// Removes [`FINALIZER`] from `name`, leaving any other finalizers intact.
pub async fn remove<K>(api: &Api<K>, current: &K) -> kube::Result<K>
where
    K: Clone + Debug + DeserializeOwned + Resource + Serialize,
{
    let name = current.name_any();
    let remaining: Vec<&String> = current
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != FINALIZER)
        .collect();
    let patch = serde_json::json!({ "metadata": { "finalizers": remaining } });
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch)).await
}

pub fn has_finalizer<K: Resource>(obj: &K) -> bool {
    obj.meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|f| f == FINALIZER))
}
