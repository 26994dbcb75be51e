//! Object reconciler (§4.6): management-policy-gated create/update/delete,
//! readiness evaluation, connection-detail publishing, status marshaling.
//!
//! The decision of *what* to do (create/update/leave alone/delete) is a pure
//! function of (does the remote exist, has it drifted, what the policy
//! allows, is deletion requested) — [`plan`] — kept separate from the async
//! code that executes it.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::api::DynamicObject;
use kube::runtime::controller::Action;
use serde_json::Value;

use crate::api::common::{self, DeletionPolicy, ManagementAction, ManagementActions, ReadinessPolicy};
use crate::api::object::{AtProvider, ObjectSpecFields, ObjectStatus};
use crate::error::Error;
use crate::informer::{InformerKey, ObjectId, ResourceRef};
use crate::manifest::parse_manifest;
use crate::reference::{apply_patches, resolve_references};
use crate::syncer::csa::CsaSyncer;
use crate::syncer::ssa::SsaSyncer;
use crate::syncer::{AnySyncer, Syncer, SyncStrategy};

use super::{provider_config_identity, resolve_client, Context};

const POLL_INTERVAL: Duration = Duration::from_secs(60);
const REFERENCE_RETRY: Duration = Duration::from_secs(15);

/// Stable reason strings stamped on status conditions (§4.6, §8 E1/E2 use the
/// matching wire strings for `ManagementPolicy`; these are the Object
/// reconciler's own condition reasons).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reason {
    SuccessfulCreate,
    ObjectNotExists,
    OutOfSync,
    ReferenceNotReady,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::SuccessfulCreate => "SuccessfulCreate",
            Reason::ObjectNotExists => "ObjectNotExists",
            Reason::OutOfSync => "OutOfSync",
            Reason::ReferenceNotReady => "ReferenceNotReady",
        };
        f.write_str(s)
    }
}

/// What the reconciler should do next, given the observable facts (§4.6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Plan {
    DeleteRemoteThenFinalizer,
    RemoveFinalizerOnly,
    Create,
    ObjectNotExists,
    Update,
    OutOfSync,
    InSync,
}

/// Pure decision table (§4.6). No I/O, no management-policy surprises hidden
/// behind async code — this is what invariant 2 (policy enforcement) tests
/// directly.
pub fn plan(
    deletion_requested: bool,
    remote_exists: bool,
    drift: bool,
    policy: &ManagementActions,
    deletion_policy: DeletionPolicy,
) -> Plan {
    let policy = common::expand(policy);
    if deletion_requested {
        return if common::allows(&policy, ManagementAction::Delete) && deletion_policy == DeletionPolicy::Delete
        {
            Plan::DeleteRemoteThenFinalizer
        } else {
            Plan::RemoveFinalizerOnly
        };
    }
    if !remote_exists {
        return if common::allows(&policy, ManagementAction::Create) {
            Plan::Create
        } else {
            Plan::ObjectNotExists
        };
    }
    if drift {
        return if common::allows(&policy, ManagementAction::Update) {
            Plan::Update
        } else {
            Plan::OutOfSync
        };
    }
    Plan::InSync
}

/// Full async reconcile entry point for one Object (§4.6). `object_namespace`
/// is the namespace the *Object resource itself* lives in (used to resolve a
/// namespaced `ProviderConfig`); `None` for the cluster-scoped `Object` kind.
pub async fn reconcile(
    ctx: &Context,
    object_name: &str,
    object_namespace: Option<&str>,
    spec: &ObjectSpecFields,
    mut status: ObjectStatus,
    deletion_requested: bool,
) -> Result<(ObjectStatus, Action), Error> {
    if spec.management_actions.is_empty() {
        return Err(Error::EmptyManagementActions);
    }

    let target_client = resolve_client(ctx, object_namespace, &spec.provider_config_ref).await?;

    if deletion_requested {
        return reconcile_deletion(ctx, &target_client, object_name, object_namespace, spec, status).await;
    }

    let resolved = match resolve_references(&ctx.client, object_namespace, &spec.references).await {
        Ok(resolved) => resolved,
        Err(Error::ReferenceNotReady(message)) => {
            set_condition(&mut status, "Ready", false, Reason::ReferenceNotReady, &message);
            return Ok((status, Action::requeue(REFERENCE_RETRY)));
        }
        Err(e) => return Err(e),
    };

    let mut manifest_value: Value = serde_json::to_value(&spec.for_provider.manifest)?;
    apply_patches(&mut manifest_value, &resolved);
    let manifest = common::Manifest {
        raw: serde_json::to_vec(&manifest_value)?,
    };
    let desired_manifest = parse_manifest(object_name, &manifest)?;

    let syncer = build_syncer(ctx, object_name);
    let api = crate::syncer::csa::namespaced_or_cluster(&target_client, &desired_manifest)?;
    let remote_name = desired_manifest
        .metadata
        .name
        .clone()
        .unwrap_or_else(|| object_name.to_string());

    let current = api
        .get_opt(&remote_name)
        .await
        .map_err(Error::RemoteTransient)?;

    let desired = syncer
        .get_desired_state(&target_client, &desired_manifest)
        .await?;

    let (observed, drift) = match &current {
        None => (None, true),
        Some(current) => {
            let observed = syncer.get_observed_state(&target_client, current).await?;
            let observed_value = observed
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?
                .unwrap_or(Value::Null);
            let desired_value = serde_json::to_value(&desired)?;
            let drift = !crate::syncer::equality::semantically_equal(&observed_value, &desired_value);
            (observed, drift)
        }
    };

    let already_ready = condition_bool(&status, "Ready").unwrap_or(false);

    let decision = plan(
        false,
        current.is_some(),
        drift,
        &spec.management_actions,
        spec.deletion_policy,
    );

    let (remote_result, reason, synced) = match decision {
        Plan::Create => {
            let created = syncer.sync_resource(&target_client, None, &desired).await?;
            (Some(created), Reason::SuccessfulCreate, true)
        }
        Plan::ObjectNotExists => (None, Reason::ObjectNotExists, false),
        Plan::Update => {
            let current = current.expect("Update implies the remote exists");
            let synced = syncer
                .sync_resource(&target_client, Some(&current), &desired)
                .await?;
            (Some(synced), Reason::SuccessfulCreate, true)
        }
        Plan::OutOfSync => (current, Reason::OutOfSync, false),
        Plan::InSync => (current, Reason::SuccessfulCreate, true),
        Plan::DeleteRemoteThenFinalizer | Plan::RemoveFinalizerOnly => {
            unreachable!("deletion is handled by reconcile_deletion")
        }
    };

    set_condition(&mut status, "Synced", synced, reason, "");

    let remote_for_readiness = remote_result.as_ref().or(observed.as_ref());
    let ready = compute_readiness(
        spec.readiness,
        remote_for_readiness,
        matches!(decision, Plan::Create),
        already_ready,
    );
    set_condition(&mut status, "Ready", ready, reason, "");

    if let Some(remote) = &remote_result {
        status.at_provider = AtProvider {
            manifest: Some(serde_json::to_value(remote)?),
        };
    }

    publish_connection_details(&target_client, spec).await?;

    watch_resources(ctx, object_name, object_namespace, spec, &desired_manifest, &remote_name);

    Ok((status, Action::requeue(POLL_INTERVAL)))
}

/// `WatchResources(pc, GVKs...)` (§4.7): registers this Object's interest in
/// its own managed resource's GVK plus every reference's GVK, so the
/// informer registry knows which watches are still needed. Called with
/// empty sets when `spec.watch` is false, which releases any interest a
/// previous reconcile (with `watch: true`) had registered.
fn watch_resources(
    ctx: &Context,
    object_name: &str,
    object_namespace: Option<&str>,
    spec: &ObjectSpecFields,
    desired_manifest: &DynamicObject,
    remote_name: &str,
) {
    let object_id = ObjectId {
        namespace: object_namespace.map(str::to_string),
        name: object_name.to_string(),
    };

    if !spec.watch {
        ctx.informers.watch_resources(object_id, Vec::new(), Vec::new());
        return;
    }

    let managed_identity = provider_config_identity(object_namespace, &spec.provider_config_ref);
    let mut informer_keys = Vec::new();
    let mut resource_refs = Vec::new();

    if let Some(type_meta) = desired_manifest.types.as_ref() {
        if let Ok(gvk) = kube::core::GroupVersionKind::try_from(type_meta) {
            informer_keys.push(InformerKey {
                provider_config_identity: managed_identity.clone(),
                gvk: gvk.clone(),
            });
            resource_refs.push(ResourceRef {
                provider_config_identity: managed_identity,
                namespace: desired_manifest.metadata.namespace.clone(),
                name: remote_name.to_string(),
                gvk,
            });
        }
    }

    for reference in &spec.references {
        let depends_on = reference.depends_on();
        let type_meta = kube::core::TypeMeta {
            api_version: depends_on.api_version.clone(),
            kind: depends_on.kind.clone(),
        };
        let Ok(gvk) = kube::core::GroupVersionKind::try_from(&type_meta) else {
            continue;
        };
        informer_keys.push(InformerKey {
            provider_config_identity: None,
            gvk: gvk.clone(),
        });
        resource_refs.push(ResourceRef {
            provider_config_identity: None,
            namespace: depends_on.namespace.clone(),
            name: depends_on.name.clone(),
            gvk,
        });
    }

    ctx.informers.watch_resources(object_id, informer_keys, resource_refs);
}

async fn reconcile_deletion(
    ctx: &Context,
    target_client: &kube::Client,
    object_name: &str,
    object_namespace: Option<&str>,
    spec: &ObjectSpecFields,
    status: ObjectStatus,
) -> Result<(ObjectStatus, Action), Error> {
    let decision = plan(true, true, false, &spec.management_actions, spec.deletion_policy);
    ctx.informers.watch_resources(
        ObjectId {
            namespace: object_namespace.map(str::to_string),
            name: object_name.to_string(),
        },
        Vec::new(),
        Vec::new(),
    );
    match decision {
        Plan::RemoveFinalizerOnly => Ok((status, Action::await_change())),
        Plan::DeleteRemoteThenFinalizer => {
            let manifest = parse_manifest(object_name, &spec.for_provider.manifest)?;
            let api = crate::syncer::csa::namespaced_or_cluster(target_client, &manifest)?;
            let name = manifest
                .metadata
                .name
                .clone()
                .unwrap_or_else(|| object_name.to_string());
            match api.delete(&name, &Default::default()).await {
                Ok(_) => {}
                Err(kube::Error::Api(e)) if e.code == 404 => {}
                Err(e) => return Err(Error::RemoteTransient(e)),
            }
            Ok((status, Action::await_change()))
        }
        _ => unreachable!("plan(deletion_requested=true, ..) only returns the two deletion variants"),
    }
}

fn build_syncer<'a>(ctx: &'a Context, object_name: &str) -> AnySyncer<'a> {
    match ctx.sync_strategy {
        SyncStrategy::Csa => AnySyncer::Csa(CsaSyncer),
        SyncStrategy::Ssa => AnySyncer::Ssa(SsaSyncer::new(object_name, &ctx.ssa_cache)),
    }
}

/// Readiness evaluation (§4.6). `just_created` and `already_ready` implement
/// the `SuccessfulCreate` policy's stickiness: true forever once a create
/// succeeds, computed fresh every reconcile otherwise.
fn compute_readiness(
    policy: ReadinessPolicy,
    observed: Option<&DynamicObject>,
    just_created: bool,
    already_ready: bool,
) -> bool {
    match policy {
        ReadinessPolicy::SuccessfulCreate => already_ready || just_created,
        ReadinessPolicy::DeriveFromObject => remote_conditions(observed)
            .into_iter()
            .find(|(t, _)| t == "Ready")
            .is_some_and(|(_, s)| s == "True"),
        ReadinessPolicy::AllTrue => {
            let conditions = remote_conditions(observed);
            !conditions.is_empty() && conditions.iter().all(|(_, s)| s == "True")
        }
    }
}

fn remote_conditions(observed: Option<&DynamicObject>) -> Vec<(String, String)> {
    let Some(observed) = observed else {
        return Vec::new();
    };
    observed
        .data
        .pointer("/status/conditions")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|c| {
                    let t = c.get("type")?.as_str()?.to_string();
                    let s = c.get("status")?.as_str()?.to_string();
                    Some((t, s))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn condition_bool(status: &ObjectStatus, type_: &str) -> Option<bool> {
    status
        .conditions
        .iter()
        .find(|c| c.type_ == type_)
        .map(|c| c.status == "True")
}

fn set_condition(status: &mut ObjectStatus, type_: &str, is_true: bool, reason: Reason, message: &str) {
    let condition = Condition {
        type_: type_.to_string(),
        status: if is_true { "True" } else { "False" }.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        observed_generation: None,
        last_transition_time: Time(Utc::now()),
    };
    if let Some(existing) = status.conditions.iter_mut().find(|c| c.type_ == type_) {
        if existing.status != condition.status {
            *existing = condition;
        } else {
            existing.reason = condition.reason;
            existing.message = condition.message;
        }
    } else {
        status.conditions.push(condition);
    }
}

/// Publishes `spec.connectionDetails` (§4.6): for each entry, fetch the
/// referenced object from the remote cluster and write the requested key
/// into the connection secret. Publishing the secret itself is the
/// out-of-scope generic managed-resource runtime's job (§1); this only
/// resolves the `(key, value)` pairs it would write.
async fn publish_connection_details(
    target_client: &kube::Client,
    spec: &ObjectSpecFields,
) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let mut published = Vec::new();
    for detail in &spec.connection_details {
        let api = crate::reference::api_for(target_client, &detail.object_reference, None)?;
        let name = &detail.object_reference.name;
        let remote = api.get(name).await.map_err(Error::RemoteTransient)?;
        let value = remote
            .data
            .pointer(&format!("/data/{}", detail.from_connection_secret_key))
            .or_else(|| {
                remote
                    .data
                    .pointer(&format!("/status/{}", detail.from_connection_secret_key))
            })
            .cloned();
        if let Some(value) = value {
            let bytes = match value {
                Value::String(s) => s.into_bytes(),
                other => serde_json::to_vec(&other)?,
            };
            published.push((detail.to_connection_secret_key().to_string(), bytes));
        }
    }
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions(labels: &[ManagementAction]) -> ManagementActions {
        labels.iter().copied().collect()
    }

    /// Invariant 2: with policy = {Observe}, no Create/Update/Delete is ever
    /// planned, regardless of drift or existence.
    #[test]
    fn invariant_observe_only_never_writes() {
        let policy = actions(&[ManagementAction::Observe]);
        assert_eq!(
            plan(false, false, true, &policy, DeletionPolicy::Delete),
            Plan::ObjectNotExists
        );
        assert_eq!(
            plan(false, true, true, &policy, DeletionPolicy::Delete),
            Plan::OutOfSync
        );
        assert_eq!(
            plan(true, true, false, &policy, DeletionPolicy::Delete),
            Plan::RemoveFinalizerOnly
        );
    }

    #[test]
    fn create_allowed_when_policy_includes_create() {
        let policy = actions(&[ManagementAction::Observe, ManagementAction::Create]);
        assert_eq!(plan(false, false, true, &policy, DeletionPolicy::Delete), Plan::Create);
    }

    #[test]
    fn update_allowed_when_policy_includes_update() {
        let policy = actions(&[ManagementAction::Observe, ManagementAction::Update]);
        assert_eq!(plan(false, true, true, &policy, DeletionPolicy::Delete), Plan::Update);
    }

    #[test]
    fn in_sync_when_no_drift() {
        let policy = actions(&[ManagementAction::Observe]);
        assert_eq!(plan(false, true, false, &policy, DeletionPolicy::Delete), Plan::InSync);
    }

    #[test]
    fn delete_requires_both_policy_and_deletion_policy() {
        let policy = actions(&[ManagementAction::Delete]);
        assert_eq!(
            plan(true, true, false, &policy, DeletionPolicy::Delete),
            Plan::DeleteRemoteThenFinalizer
        );
        assert_eq!(
            plan(true, true, false, &policy, DeletionPolicy::Orphan),
            Plan::RemoveFinalizerOnly
        );
    }

    #[test]
    fn all_umbrella_permits_everything() {
        let policy = actions(&[ManagementAction::All]);
        assert_eq!(plan(false, false, true, &policy, DeletionPolicy::Delete), Plan::Create);
        assert_eq!(plan(false, true, true, &policy, DeletionPolicy::Delete), Plan::Update);
        assert_eq!(
            plan(true, true, false, &policy, DeletionPolicy::Delete),
            Plan::DeleteRemoteThenFinalizer
        );
    }

    #[test]
    fn successful_create_readiness_is_sticky() {
        assert!(compute_readiness(ReadinessPolicy::SuccessfulCreate, None, true, false));
        assert!(compute_readiness(ReadinessPolicy::SuccessfulCreate, None, false, true));
        assert!(!compute_readiness(ReadinessPolicy::SuccessfulCreate, None, false, false));
    }

    #[test]
    fn all_true_requires_nonempty_and_all_true() {
        let mut obj = DynamicObject::new(
            "x",
            &kube::api::ApiResource::from_gvk(&kube::core::GroupVersionKind::gvk("", "v1", "ConfigMap")),
        );
        obj.data = serde_json::json!({"status": {"conditions": []}});
        assert!(!compute_readiness(ReadinessPolicy::AllTrue, Some(&obj), false, false));

        obj.data = serde_json::json!({"status": {"conditions": [{"type": "Ready", "status": "True"}]}});
        assert!(compute_readiness(ReadinessPolicy::AllTrue, Some(&obj), false, false));
    }
}
