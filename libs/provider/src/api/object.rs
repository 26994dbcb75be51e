//! `Object` v1alpha2 — the conversion hub (§3, §4.9). Carries the
//! richest representation: set-valued `managementActions`.
//!
//! Cluster-scoped and namespace-scoped variants are two distinct
//! `#[derive(CustomResource)]` types (kube's derive macro ties one Rust type
//! to one kind) but share every field; `ObjectSpecFields` holds the common
//! shape and is `#[serde(flatten)]`ed into both.

use super::common::{
    ConnectionDetail, DeletionPolicy, Manifest, ManagementActions, ReadinessPolicy, Reference,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `spec.forProvider` (§3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForProvider {
    pub manifest: Manifest,
}

/// Fields common to every scope/version of the hub `Object` spec (§3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpecFields {
    pub provider_config_ref: super::provider_config::ProviderConfigReference,
    pub for_provider: ForProvider,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub readiness: ReadinessPolicy,
    #[serde(default)]
    pub watch: bool,
    #[serde(default)]
    pub connection_details: Vec<ConnectionDetail>,
    pub management_actions: ManagementActions,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// `status.atProvider` (§3).
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AtProvider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<serde_json::Value>,
}

/// `ObjectStatus` (§3): standard Ready/Synced conditions plus `atProvider`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub at_provider: AtProvider,
}

/// Cluster-scoped `Object` (v1alpha2, hub).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubernetes.crossplane.io",
    version = "v1alpha2",
    kind = "Object",
    status = "ObjectStatus",
    printcolumn = r#"{"name":"KIND", "type":"string", "jsonPath":".spec.forProvider.manifest.kind"}"#,
    printcolumn = r#"{"name":"APIVERSION", "type":"string", "jsonPath":".spec.forProvider.manifest.apiVersion"}"#,
    printcolumn = r#"{"name":"PROVIDERCONFIG", "type":"string", "jsonPath":".spec.providerConfigRef.name"}"#,
    printcolumn = r#"{"name":"SYNCED", "type":"string", "jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"READY", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"AGE", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpec {
    #[serde(flatten)]
    pub fields: ObjectSpecFields,
}

/// Namespace-scoped `Object` (v1alpha2, hub). Same spec/status shape as the
/// cluster-scoped variant; only the `#[kube(...)]` scope attribute differs
/// (§3).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubernetes.crossplane.io",
    version = "v1alpha2",
    kind = "NamespacedObject",
    namespaced,
    status = "ObjectStatus",
    printcolumn = r#"{"name":"KIND", "type":"string", "jsonPath":".spec.forProvider.manifest.kind"}"#,
    printcolumn = r#"{"name":"APIVERSION", "type":"string", "jsonPath":".spec.forProvider.manifest.apiVersion"}"#,
    printcolumn = r#"{"name":"PROVIDERCONFIG", "type":"string", "jsonPath":".spec.providerConfigRef.name"}"#,
    printcolumn = r#"{"name":"SYNCED", "type":"string", "jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"READY", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"AGE", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NamespacedObjectSpec {
    #[serde(flatten)]
    pub fields: ObjectSpecFields,
}
