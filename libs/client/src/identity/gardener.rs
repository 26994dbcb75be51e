//! Gardener identity exchange: requests a short-lived admin kubeconfig for a
//! shoot cluster via the `AdminKubeconfigRequest` subresource.

use crate::error::{Error, Result};
use kube::{api::Api, core::DynamicObject, Client, Config};
use std::time::{Duration, Instant};
use tracing::debug;

/// The admin kubeconfig Gardener hands back is valid for this long unless the
/// request overrides it; used as the cache TTL when the response doesn't
/// carry an explicit expiry.
pub const DEFAULT_ADMIN_KUBECONFIG_TTL: Duration = Duration::from_secs(60 * 60);

/// A decoded response from an `AdminKubeconfigRequest`: the raw kubeconfig
/// bytes plus when they stop being valid.
pub struct ShootAdminKubeconfig {
    pub kubeconfig: Vec<u8>,
    pub expires_at: Instant,
}

/// Requests an admin kubeconfig for `shoot_name` in `shoot_namespace` against
/// the Gardener control plane reachable through `garden_client`, then builds
/// a REST [`Config`] from it plus the TTL the caller's connection cache
/// should honor.
pub async fn exchange(
    garden_client: &Client,
    shoot_namespace: &str,
    shoot_name: &str,
) -> Result<(Config, Instant)> {
    let request = admin_kubeconfig_request(shoot_name);
    let api: Api<DynamicObject> =
        Api::namespaced_with(garden_client.clone(), shoot_namespace, &shoot_resource());
    let response: DynamicObject = api
        .create_subresource(
            "adminkubeconfig",
            shoot_name,
            &kube::api::PostParams::default(),
            serde_json::to_vec(&request).map_err(|e| Error::InvalidKubeconfig(e.to_string()))?,
        )
        .await?;
    let response = serde_json::to_value(&response).map_err(|e| Error::InvalidKubeconfig(e.to_string()))?;
    let shoot_admin_kubeconfig = decode_response(&response)?;
    let config = Config::from_custom_kubeconfig(
        kube::config::Kubeconfig::from_yaml(
            std::str::from_utf8(&shoot_admin_kubeconfig.kubeconfig)
                .map_err(|e| Error::InvalidKubeconfig(e.to_string()))?,
        )
        .map_err(|e| Error::InvalidKubeconfig(e.to_string()))?,
        &Default::default(),
    )
    .await
    .map_err(|e| Error::InvalidKubeconfig(e.to_string()))?;
    debug!(shoot = shoot_name, "exchanged Gardener identity for admin kubeconfig");
    Ok((config, shoot_admin_kubeconfig.expires_at))
}

fn shoot_resource() -> kube::core::ApiResource {
    kube::core::ApiResource {
        group: "core.gardener.cloud".into(),
        version: "v1beta1".into(),
        api_version: "core.gardener.cloud/v1beta1".into(),
        kind: "Shoot".into(),
        plural: "shoots".into(),
    }
}

fn admin_kubeconfig_request(shoot_name: &str) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "authentication.gardener.cloud/v1alpha1",
        "kind": "AdminKubeconfigRequest",
        "metadata": { "name": shoot_name },
        "spec": { "expirationSeconds": DEFAULT_ADMIN_KUBECONFIG_TTL.as_secs() },
    })
}

fn decode_response(response: &serde_json::Value) -> Result<ShootAdminKubeconfig> {
    let encoded = response
        .pointer("/status/kubeconfig")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidKubeconfig("missing status.kubeconfig".into()))?;
    let kubeconfig = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        .map_err(|e| Error::InvalidKubeconfig(e.to_string()))?;
    let ttl = response
        .pointer("/spec/expirationSeconds")
        .and_then(|v| v.as_u64())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_ADMIN_KUBECONFIG_TTL);
    Ok(ShootAdminKubeconfig {
        kubeconfig,
        expires_at: Instant::now() + ttl,
    })
}
