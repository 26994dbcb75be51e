//! Constructs per-cluster REST configuration and typed clients from
//! kubeconfig bytes or in-cluster identity (§4.1).

use crate::credentials::{CredentialsSource, IdentitySpec};
use crate::error::{Error, Result};
use crate::identity;
use kube::{Client, Config};
use std::time::Instant;

/// A resolved client plus the instant (if any) after which the connection
/// cache should stop serving it and rebuild from scratch.
pub struct Resolved {
    pub client: Client,
    pub expires_at: Option<Instant>,
}

/// Builds a [`Client`] for the cluster a `ProviderConfig` describes.
///
/// `kubeconfig_bytes` is `Some` only for [`CredentialsSource::Secret`] and
/// [`CredentialsSource::Filesystem`] — the caller (the `provider-kubernetes`
/// crate, which knows how to fetch Secrets and read files through its own
/// client) is expected to have already loaded them; this function only
/// parses and assembles the resulting `Config`.
pub async fn build_client(
    source: &CredentialsSource,
    kubeconfig_bytes: Option<&[u8]>,
    identity: Option<&IdentitySpec>,
    token_exchange: Option<String>,
) -> Result<Resolved> {
    let base_config = match source {
        CredentialsSource::InjectedIdentity => Config::infer().await?,
        CredentialsSource::Secret { .. } | CredentialsSource::Filesystem { .. } => {
            let bytes = kubeconfig_bytes.ok_or_else(|| {
                Error::InvalidKubeconfig("kubeconfig bytes not supplied by caller".into())
            })?;
            config_from_kubeconfig_bytes(bytes).await?
        }
        CredentialsSource::Environment { env_var } => {
            let path = std::env::var(env_var)
                .map_err(|_| Error::InvalidKubeconfig(format!("env var {env_var} is not set")))?;
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| Error::InvalidKubeconfig(e.to_string()))?;
            config_from_kubeconfig_bytes(&bytes).await?
        }
    };

    let (config, expires_at) = match identity {
        None => (base_config, None),
        Some(IdentitySpec::Aws { cluster, .. }) => {
            let token = token_exchange
                .ok_or_else(|| Error::CredentialExchange { provider: "aws", message: "no token supplied".into() })?;
            let config = identity::aws::exchange(cluster, base_config, token).await?;
            (config, None)
        }
        Some(IdentitySpec::Gcp { service_account }) => {
            let token = token_exchange
                .ok_or_else(|| Error::CredentialExchange { provider: "gcp", message: "no token supplied".into() })?;
            let config = identity::gcp::exchange(service_account, base_config, token).await?;
            (config, None)
        }
        Some(IdentitySpec::Azure { client_id }) => {
            let token = token_exchange
                .ok_or_else(|| Error::CredentialExchange { provider: "azure", message: "no token supplied".into() })?;
            let config = identity::azure::exchange(client_id.as_deref(), base_config, token).await?;
            (config, None)
        }
        Some(IdentitySpec::Gardener { .. }) => {
            // Gardener's AdminKubeconfigRequest needs a client against the
            // garden cluster, which the caller already has (it's the
            // control-plane client). Callers that select Gardener identity
            // should call `identity::gardener::exchange` directly and pass
            // the result straight to `ConnectionCache::insert` instead of
            // going through this generic path.
            return Err(Error::CredentialExchange {
                provider: "gardener",
                message: "gardener identity must be resolved by the caller via identity::gardener::exchange".into(),
            });
        }
    };

    Ok(Resolved {
        client: Client::try_from(config)?,
        expires_at,
    })
}

async fn config_from_kubeconfig_bytes(bytes: &[u8]) -> Result<Config> {
    let text = std::str::from_utf8(bytes).map_err(|e| Error::InvalidKubeconfig(e.to_string()))?;
    let kubeconfig = kube::config::Kubeconfig::from_yaml(text)
        .map_err(|e| Error::InvalidKubeconfig(e.to_string()))?;
    Config::from_custom_kubeconfig(kubeconfig, &Default::default())
        .await
        .map_err(|e| Error::InvalidKubeconfig(e.to_string()))
}
