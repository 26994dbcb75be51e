use std::sync::Arc;
use std::time::Duration;

use clap::{crate_authors, crate_description, crate_version, Parser};
use futures::StreamExt;
use kube::api::{ApiResource, DynamicObject};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::{self, Config as WatcherConfig};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{error, warn};

use provider_kubernetes::api::object::{NamespacedObject, Object};
use provider_kubernetes::api::observed_object_collection::ObservedObjectCollection;
use provider_kubernetes::controller::{self, Context};
use provider_kubernetes::finalizer;
use provider_kubernetes::informer::InformerKey;
use provider_kubernetes::syncer::SyncStrategy;
use provider_kubernetes::telemetry;
use provider_kubernetes::Error;

/// How often the informer registry's GC sweep runs (§4.7, invariant 5).
const INFORMER_GC_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(
    name = "provider-kubernetes",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n"),
)]
struct Args {
    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`.
    /// Example: "info,kube=debug,provider_kubernetes=debug"
    #[arg(long, default_value = "info", env)]
    log_filter: String,

    /// Set log format
    #[arg(long, value_enum, default_value_t = telemetry::LogFormat::Text, env)]
    log_format: telemetry::LogFormat,

    /// Which `Syncer` implementation to apply Objects with (§4.5).
    #[arg(long, value_enum, default_value_t = SyncStrategy::Ssa, env)]
    sync_strategy: SyncStrategy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    telemetry::init(&args.log_filter, args.log_format)?;

    let client = Client::try_default().await?;
    let ctx = Context::new(client.clone(), args.sync_strategy, start_informer(client.clone()));

    tokio::join!(
        run_object(client.clone(), ctx.clone()),
        run_namespaced_object(client.clone(), ctx.clone()),
        run_collection(client, ctx.clone()),
        run_informer_gc(ctx),
    );
    Ok(())
}

/// Builds the closure `Registry` uses to start one informer (§4.7). Only
/// control-plane-scoped keys (`provider_config_identity: None`, i.e.
/// `Reference`s) get a live `kube::runtime::watcher` here: a managed
/// resource's own key is always provider-config-scoped, and resolving the
/// right remote client for an arbitrary `ProviderConfigIdentity` string
/// (rather than a full `ProviderConfigReference`) isn't wired up yet.
fn start_informer(client: Client) -> provider_kubernetes::informer::StartFn {
    Box::new(move |key: &InformerKey| {
        let client = client.clone();
        let key = key.clone();
        tokio::spawn(async move {
            if key.provider_config_identity.is_some() {
                warn!(gvk = ?key.gvk, "skipping informer: provider-config-scoped watching has no client resolver yet");
                return;
            }
            let resource = ApiResource::from_gvk(&key.gvk);
            let api: Api<DynamicObject> = Api::all_with(client, &resource);
            let mut events = Box::pin(watcher::watcher(api, WatcherConfig::default()).applied_objects());
            loop {
                match events.next().await {
                    Some(Ok(obj)) => {
                        tracing::debug!(
                            gvk = ?key.gvk,
                            name = obj.metadata.name.as_deref().unwrap_or(""),
                            "informer observed an applied event"
                        );
                    }
                    Some(Err(e)) => warn!(gvk = ?key.gvk, "informer watch error: {e}"),
                    None => break,
                }
            }
        })
    })
}

/// Periodic GC sweep (§4.7, invariant 5): cancels informers no Object or
/// Collection currently references.
async fn run_informer_gc(ctx: Arc<Context>) {
    let mut ticker = tokio::time::interval(INFORMER_GC_INTERVAL);
    loop {
        ticker.tick().await;
        let collected = ctx.informers.garbage_collect();
        if !collected.is_empty() {
            tracing::info!(count = collected.len(), "garbage collected unreferenced informers");
        }
    }
}

/// Drives the cluster-scoped `Object` kind: finalizer management plus
/// `controller::object::reconcile` (§4.6).
async fn run_object(client: Client, ctx: Arc<Context>) {
    let api: Api<Object> = Api::all(client);
    if let Err(e) = api.list(&Default::default()).await {
        error!("Object CRD is not queryable; {e:?}. Is the CRD installed?");
        std::process::exit(1);
    }
    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile_object, error_policy, ctx)
        .filter_map(|x| async move { x.ok() })
        .for_each(|_| futures::future::ready(()))
        .await;
}

async fn reconcile_object(object: Arc<Object>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = object.name_any();
    let api: Api<Object> = Api::all(ctx.client.clone());
    let deletion_requested = object.meta().deletion_timestamp.is_some();

    if !deletion_requested && !finalizer::has_finalizer(object.as_ref()) {
        finalizer::add(&api, &name).await.map_err(Error::Kube)?;
    }

    let status = object.status.clone().unwrap_or_default();
    let (status, action) = controller::object::reconcile(
        &ctx,
        &name,
        None,
        &object.spec.fields,
        status,
        deletion_requested,
    )
    .await?;

    patch_object_status(&api, &name, &status).await?;

    if deletion_requested && finalizer::has_finalizer(object.as_ref()) {
        let current = api.get(&name).await.map_err(Error::Kube)?;
        finalizer::remove(&api, &current).await.map_err(Error::Kube)?;
    }

    Ok(action)
}

async fn patch_object_status(
    api: &Api<Object>,
    name: &str,
    status: &provider_kubernetes::api::object::ObjectStatus,
) -> Result<(), Error> {
    let patch = serde_json::json!({ "status": status });
    api.patch_status(
        name,
        &kube::api::PatchParams::default(),
        &kube::api::Patch::Merge(&patch),
    )
    .await
    .map_err(Error::Kube)?;
    Ok(())
}

/// Drives the namespace-scoped `NamespacedObject` kind; same reconciler, the
/// only difference is the resource's own namespace is threaded through to
/// `ProviderConfig` resolution (§4.6).
async fn run_namespaced_object(client: Client, ctx: Arc<Context>) {
    let api: Api<NamespacedObject> = Api::all(client);
    if let Err(e) = api.list(&Default::default()).await {
        error!("NamespacedObject CRD is not queryable; {e:?}. Is the CRD installed?");
        std::process::exit(1);
    }
    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile_namespaced_object, error_policy_namespaced, ctx)
        .filter_map(|x| async move { x.ok() })
        .for_each(|_| futures::future::ready(()))
        .await;
}

async fn reconcile_namespaced_object(
    object: Arc<NamespacedObject>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = object.name_any();
    let namespace = object.namespace().unwrap_or_default();
    let api: Api<NamespacedObject> = Api::namespaced(ctx.client.clone(), &namespace);
    let deletion_requested = object.meta().deletion_timestamp.is_some();

    if !deletion_requested && !finalizer::has_finalizer(object.as_ref()) {
        finalizer::add(&api, &name).await.map_err(Error::Kube)?;
    }

    let status = object.status.clone().unwrap_or_default();
    let (status, action) = controller::object::reconcile(
        &ctx,
        &name,
        Some(&namespace),
        &object.spec.fields,
        status,
        deletion_requested,
    )
    .await?;

    let patch = serde_json::json!({ "status": status });
    api.patch_status(
        &name,
        &kube::api::PatchParams::default(),
        &kube::api::Patch::Merge(&patch),
    )
    .await
    .map_err(Error::Kube)?;

    if deletion_requested && finalizer::has_finalizer(object.as_ref()) {
        let current = api.get(&name).await.map_err(Error::Kube)?;
        finalizer::remove(&api, &current).await.map_err(Error::Kube)?;
    }

    Ok(action)
}

/// Drives `ObservedObjectCollection` (§4.8). No finalizer: deleting the
/// collection orphans its children rather than cleaning them up, same as
/// Crossplane's own ObservedObjectCollection.
async fn run_collection(client: Client, ctx: Arc<Context>) {
    let api: Api<ObservedObjectCollection> = Api::all(client);
    if let Err(e) = api.list(&Default::default()).await {
        error!("ObservedObjectCollection CRD is not queryable; {e:?}. Is the CRD installed?");
        std::process::exit(1);
    }
    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile_collection, error_policy_collection, ctx)
        .filter_map(|x| async move { x.ok() })
        .for_each(|_| futures::future::ready(()))
        .await;
}

async fn reconcile_collection(
    collection: Arc<ObservedObjectCollection>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let name = collection.name_any();
    let api: Api<ObservedObjectCollection> = Api::all(ctx.client.clone());
    let status = collection.status.clone().unwrap_or_default();

    let (status, action) =
        controller::collection::reconcile(&ctx, &name, &collection.spec.fields, status).await?;

    let patch = serde_json::json!({ "status": status });
    api.patch_status(
        &name,
        &kube::api::PatchParams::default(),
        &kube::api::Patch::Merge(&patch),
    )
    .await
    .map_err(Error::Kube)?;

    Ok(action)
}

fn error_policy(object: Arc<Object>, error: &Error, _ctx: Arc<Context>) -> Action {
    log_reconcile_error(&object.name_any(), error)
}

fn error_policy_namespaced(
    object: Arc<NamespacedObject>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    log_reconcile_error(&object.name_any(), error)
}

fn error_policy_collection(
    collection: Arc<ObservedObjectCollection>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    log_reconcile_error(&collection.name_any(), error)
}

fn log_reconcile_error(name: &str, error: &Error) -> Action {
    if error.is_not_ready() {
        warn!(name, reason = error.reason(), "not ready yet: {}", error.redacted_message());
    } else {
        error!(name, reason = error.reason(), "reconcile failed: {}", error.redacted_message());
    }
    Action::requeue(std::time::Duration::from_secs(30))
}
