//! Credential source and cloud-identity types shared between the
//! `ProviderConfig`/`ClusterProviderConfig` CRDs (defined in
//! `provider-kubernetes`) and this crate's [`crate::factory`].
//!
//! These live here, rather than in the CRD crate, because the factory that
//! consumes them and the CRD that declares them both need the same shape and
//! neither should own the other; the CRD crate depends on this crate and
//! re-exports these types into its spec structs.

use k8s_openapi::api::core::v1::SecretKeySelector;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Exactly one of these must be set on a `ProviderConfigSpec` (§3 invariant).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum CredentialsSource {
    /// Use the identity the controller itself is running as (in-cluster
    /// service account, or cloud workload identity).
    InjectedIdentity,
    /// Load a kubeconfig from a Secret key.
    Secret { secret_ref: SecretKeySelector },
    /// Load a kubeconfig from an environment variable.
    Environment { env_var: String },
    /// Load a kubeconfig from a file on disk.
    Filesystem { path: String },
}

/// Cloud-specific identity used to exchange the base credentials for a
/// short-lived token (§4.1). `None` means the credentials source above is
/// used as-is.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", tag = "provider")]
pub enum IdentitySpec {
    Aws {
        /// ARN of the role to assume, if any.
        role_arn: Option<String>,
        /// EKS cluster ARN or bare name (§4.1, edge case E4).
        cluster: String,
    },
    Gcp {
        /// Service account to impersonate.
        service_account: String,
    },
    Azure {
        /// MSI client ID; `None` selects the system-assigned identity.
        client_id: Option<String>,
    },
    Gardener {
        shoot_namespace: String,
        shoot_name: String,
    },
}
