//! `Object` v1beta1 — current stored/served version, set-valued
//! `managementPolicies` (§4.9). Converts through the v1alpha2 hub.

use super::common::{
    ConnectionDetail, DeletionPolicy, ManagementActions, Manifest, ReadinessPolicy, Reference,
};
use super::provider_config::ProviderConfigReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// v1beta1 uses the same `{All, Observe, Create, Update, Delete,
/// LateInitialize}` vocabulary as the v1alpha2 hub (§4.9) — re-exported here
/// under the name the upstream CRD schema uses for this field,
/// `managementPolicies`.
pub type ManagementPolicies = ManagementActions;

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForProvider {
    pub manifest: Manifest,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpecFields {
    pub provider_config_ref: ProviderConfigReference,
    pub for_provider: ForProvider,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub readiness: ReadinessPolicy,
    #[serde(default)]
    pub watch: bool,
    #[serde(default)]
    pub connection_details: Vec<ConnectionDetail>,
    pub management_policies: ManagementPolicies,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AtProvider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub at_provider: AtProvider,
}

/// Cluster-scoped `Object` (v1beta1, served+stored).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubernetes.crossplane.io",
    version = "v1beta1",
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
