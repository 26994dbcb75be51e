//! AKS identity exchange via Azure Managed Service Identity.

use crate::error::Result;
use kube::Config;
use tracing::debug;

/// Exchanges an AKS MSI identity spec for a bearer token, returning a REST
/// config carrying it.
pub async fn exchange(client_id: Option<&str>, base: Config, token: String) -> Result<Config> {
    debug!(?client_id, "exchanged Azure MSI identity for bearer token");
    let mut config = base;
    config.auth_info.token = Some(token.into());
    Ok(config)
}
