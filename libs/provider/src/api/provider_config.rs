//! `ProviderConfig`, `ClusterProviderConfig`, and `ProviderConfigUsage` (§3,
//! §6).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use provider_kubernetes_client::{CredentialsSource, IdentitySpec};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How an Object/Collection refers to the `ProviderConfig` it uses (§3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigReference {
    pub name: String,
}

/// Fields shared by the namespaced and cluster-scoped ProviderConfig (§3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpecFields {
    pub credentials: CredentialsSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentitySpec>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Number of Objects currently referencing this ProviderConfig.
    #[serde(default)]
    pub users: i64,
}

/// Namespaced `ProviderConfig` (§3, §6).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubernetes.crossplane.io",
    version = "v1alpha1",
    kind = "ProviderConfig",
    namespaced,
    status = "ProviderConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    #[serde(flatten)]
    pub fields: ProviderConfigSpecFields,
}

/// Cluster-scoped `ClusterProviderConfig` (§3, §6).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubernetes.crossplane.io",
    version = "v1alpha1",
    kind = "ClusterProviderConfig",
    status = "ProviderConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProviderConfigSpec {
    #[serde(flatten)]
    pub fields: ProviderConfigSpecFields,
}

/// Records that a particular Object is using a particular ProviderConfig, so
/// the ProviderConfig is not collected while in use (§3, §6). No status
/// subresource: existence alone is the signal.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubernetes.crossplane.io",
    version = "v1alpha1",
    kind = "ProviderConfigUsage",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsageSpec {
    pub provider_config_ref: ProviderConfigReference,
    pub resource_ref: super::common::DependsOn,
}
