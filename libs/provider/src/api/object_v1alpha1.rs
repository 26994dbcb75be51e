//! `Object` v1alpha1 — the historical, singleton-`ManagementPolicy` shape
//! (§4.9). Not the hub; converts through v1alpha2.

use super::common::{ConnectionDetail, DeletionPolicy, Manifest, ReadinessPolicy, Reference};
use super::provider_config::ProviderConfigReference;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The legacy singleton management policy (§4.9). `""` and `Default` are
/// distinct wire values that both map forward to `{All}`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum ManagementPolicy {
    #[default]
    #[serde(rename = "Default")]
    Default,
    #[serde(rename = "")]
    Empty,
    Observe,
    ObserveCreateUpdate,
    ObserveDelete,
}

impl std::fmt::Display for ManagementPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagementPolicy::Default => write!(f, "Default"),
            ManagementPolicy::Empty => write!(f, ""),
            ManagementPolicy::Observe => write!(f, "Observe"),
            ManagementPolicy::ObserveCreateUpdate => write!(f, "ObserveCreateUpdate"),
            ManagementPolicy::ObserveDelete => write!(f, "ObserveDelete"),
        }
    }
}

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
    #[serde(default)]
    pub management_policy: ManagementPolicy,
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

/// Cluster-scoped `Object` (v1alpha1, legacy).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubernetes.crossplane.io",
    version = "v1alpha1",
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
