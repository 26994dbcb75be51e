//! Shared reconciler context (§4.1, §4.6, §4.8) and per-ProviderConfig
//! client resolution. The reconcile loop, rate limiting, finalizer
//! orchestration and status-condition machinery that would normally drive
//! these entry points is the out-of-scope generic managed-resource runtime
//! (§1); `object::reconcile`/`collection::reconcile` are plain
//! `async fn(...) -> Result<Action>` so that runtime (or this repo's own
//! tests) can hand them to a `kube::runtime::controller::Controller`.

pub mod collection;
pub mod object;

use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ResourceExt};
use kube::Client;
use provider_kubernetes_client::{CacheKey, ConnectionCache};

use crate::api::provider_config::{ProviderConfigReference, ProviderConfigSpecFields};
use crate::error::Error;
use crate::informer::{Registry, StartFn};
use crate::ssa_cache::SsaCache;
use crate::syncer::SyncStrategy;

/// State shared across every reconcile, regardless of which Object or
/// Collection it concerns.
#[derive(Clone)]
pub struct Context {
    /// Client for the control plane the Objects/Collections themselves live on.
    pub client: Client,
    pub connections: Arc<ConnectionCache>,
    pub ssa_cache: Arc<SsaCache>,
    pub sync_strategy: SyncStrategy,
    /// Cross-cluster informer registry (§4.7). Reconcilers call
    /// `watch_resources` at the end of every run; the embedding binary
    /// supplies `start_informer` (how to actually spin up a watch for a key)
    /// and is responsible for running the periodic `garbage_collect` sweep.
    pub informers: Arc<Registry<StartFn>>,
}

impl Context {
    pub fn new(client: Client, sync_strategy: SyncStrategy, start_informer: StartFn) -> Arc<Self> {
        Arc::new(Self {
            client,
            connections: Arc::new(ConnectionCache::new()),
            ssa_cache: Arc::new(SsaCache::new()),
            sync_strategy,
            informers: Arc::new(Registry::new(start_informer)),
        })
    }
}

/// Stable identity string for a `ProviderConfigReference`, used as an
/// [`crate::informer::InformerKey`]/[`crate::informer::ResourceRef`]'s
/// `provider_config_identity` (§4.1, §4.7) — `None` for the control plane
/// itself (the caller passes `namespace: None` with no reference in that
/// case; this helper is only for resolved, Object-scoped references).
pub fn provider_config_identity(
    namespace: Option<&str>,
    reference: &ProviderConfigReference,
) -> crate::informer::ProviderConfigIdentity {
    Some(format!("{}/{}", namespace.unwrap_or(""), reference.name))
}

/// Resolves a `ProviderConfigReference` to a client for the cluster it
/// describes, building and caching one if needed (§4.1).
///
/// `namespace` is the namespace to fetch a namespaced `ProviderConfig` from;
/// `None` looks up a `ClusterProviderConfig` instead. Token exchange for
/// cloud identities is left to the embedding binary's own cloud SDK
/// integration (§4.1) — this repo only carries the ARN-parsing/config-shape
/// half of that exchange, so `token_exchange` is always `None` here.
pub async fn resolve_client(
    ctx: &Context,
    namespace: Option<&str>,
    reference: &ProviderConfigReference,
) -> Result<Client, Error> {
    let fields = fetch_provider_config_fields(ctx, namespace, reference).await?;
    let key = CacheKey::from_spec(&fields);

    if let Some(client) = ctx.connections.get(key) {
        return Ok(client);
    }

    let kubeconfig_bytes = match &fields.credentials {
        provider_kubernetes_client::CredentialsSource::Secret { secret_ref } => {
            let ns = namespace.ok_or_else(|| {
                Error::Config("secret-sourced credentials require a namespaced ProviderConfig".into())
            })?;
            Some(fetch_secret_key(ctx, ns, secret_ref).await?)
        }
        _ => None,
    };

    let resolved = provider_kubernetes_client::factory::build_client(
        &fields.credentials,
        kubeconfig_bytes.as_deref(),
        fields.identity.as_ref(),
        None,
    )
    .await
    .map_err(Error::Client)?;

    ctx.connections
        .insert(key, resolved.client.clone(), resolved.expires_at);
    Ok(resolved.client)
}

async fn fetch_provider_config_fields(
    ctx: &Context,
    namespace: Option<&str>,
    reference: &ProviderConfigReference,
) -> Result<ProviderConfigSpecFields, Error> {
    use crate::api::provider_config::{ClusterProviderConfig, ProviderConfig};

    match namespace {
        Some(ns) => {
            let api: Api<ProviderConfig> = Api::namespaced(ctx.client.clone(), ns);
            let pc = api
                .get(&reference.name)
                .await
                .map_err(|e| Error::Config(format!("ProviderConfig {}: {e}", reference.name)))?;
            Ok(pc.spec.fields)
        }
        None => {
            let api: Api<ClusterProviderConfig> = Api::all(ctx.client.clone());
            let pc = api.get(&reference.name).await.map_err(|e| {
                Error::Config(format!("ClusterProviderConfig {}: {e}", reference.name))
            })?;
            Ok(pc.spec.fields)
        }
    }
}

async fn fetch_secret_key(
    ctx: &Context,
    namespace: &str,
    selector: &k8s_openapi::api::core::v1::SecretKeySelector,
) -> Result<Vec<u8>, Error> {
    let name = selector
        .name
        .clone()
        .ok_or_else(|| Error::Config("secretRef.name is required".into()))?;
    let api: Api<Secret> = Api::namespaced(ctx.client.clone(), namespace);
    let secret = api
        .get(&name)
        .await
        .map_err(|e| Error::Config(format!("Secret {}/{}: {e}", namespace, name)))?;
    let data = secret
        .data
        .ok_or_else(|| Error::Config(format!("Secret {}/{} has no data", namespace, name)))?;
    let value = data.get(&selector.key).ok_or_else(|| {
        Error::Config(format!(
            "Secret {}/{} has no key {}",
            namespace, secret.name_any(), selector.key
        ))
    })?;
    Ok(value.0.clone())
}
