//! `ObservedObjectCollection` (§3, §4.8).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, LabelSelector};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::provider_config::ProviderConfigReference;

/// Labels/annotations stamped onto every child Object (§3).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTemplate {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservedObjectCollectionSpec {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
    pub provider_config_ref: ProviderConfigReference,
    #[serde(default)]
    pub object_template: ObjectTemplate,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObservedObjectCollectionStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// The `{key: value}` label stamped on every child Object so the set can
    /// be enumerated (§3). Chosen once, on first reconcile, and stable
    /// thereafter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership_label: Option<BTreeMap<String, String>>,
}

/// Cluster-scoped `ObservedObjectCollection`. Name length <= 63 (§6) — the
/// CRD's `metadata.name` already inherits the Kubernetes object-name length
/// limit, so no extra schema constraint is needed here; callers that
/// generate names (the collection reconciler's child Objects, membership
/// labels) must still respect it explicitly, see [`crate::controller::collection`].
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubernetes.crossplane.io",
    version = "v1alpha1",
    kind = "ObservedObjectCollection",
    status = "ObservedObjectCollectionStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ObservedObjectCollectionSpecTop {
    #[serde(flatten)]
    pub fields: ObservedObjectCollectionSpec,
}
