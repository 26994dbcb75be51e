//! Collection reconciler (§4.8): lists resources on a target cluster
//! matching a GVK + label selector, diffs against the existing set of
//! child Objects labeled with the Collection's membership label, and
//! creates/updates/deletes children to converge (invariant 6).

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use kube::api::{Api, DynamicObject, ListParams, ObjectMeta, Patch, PatchParams};
use kube::core::{GroupVersionKind, TypeMeta};
use kube::runtime::controller::Action;
use kube::Client;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::api::common::{DeletionPolicy, Manifest, ManagementAction, ReadinessPolicy};
use crate::api::object::{ForProvider, Object, ObjectSpec, ObjectSpecFields};
use crate::api::observed_object_collection::{
    ObjectTemplate, ObservedObjectCollectionSpec, ObservedObjectCollectionStatus,
};
use crate::error::Error;
use crate::informer::{InformerKey, ObjectId};

use super::{provider_config_identity, resolve_client, Context};

/// Default poll cadence and jitter (§4.8 step 5). spec.md names the formula
/// but not concrete numbers; these are the provider's own defaults, not
/// separately configurable per Collection yet.
const POLL_BASE: Duration = Duration::from_secs(300);
const POLL_JITTER: Duration = Duration::from_secs(60);
const POLL_JITTER_PERCENTAGE: f64 = 50.0;

/// The group namespace child Objects' membership label lives under. Not the
/// target resource's own group — this is the provider's bookkeeping label,
/// same idea as `crossplane.io/claim-name` on claim-created resources.
const MEMBERSHIP_GROUP: &str = "kubernetes.crossplane.io";

fn membership_label_key() -> String {
    format!("{MEMBERSHIP_GROUP}/collection")
}

/// An upstream resource's (namespace, name) coordinate, or a known child
/// Object's — the diff key (§4.8 step 4, invariant 6).
type Coordinate = (Option<String>, String);

pub struct Diff {
    pub create: Vec<Coordinate>,
    pub delete: Vec<String>,
    pub keep: Vec<String>,
}

/// Pure set-diff over (namespace,name) coordinates (§4.8 step 4, invariant
/// 6): `children` maps each coordinate a child Object currently claims to
/// that child's own name.
pub fn diff(upstream: &BTreeSet<Coordinate>, children: &BTreeMap<Coordinate, String>) -> Diff {
    let mut create: Vec<Coordinate> = upstream
        .iter()
        .filter(|c| !children.contains_key(*c))
        .cloned()
        .collect();
    let mut delete: Vec<String> = children
        .iter()
        .filter(|(c, _)| !upstream.contains(*c))
        .map(|(_, name)| name.clone())
        .collect();
    let mut keep: Vec<String> = children
        .iter()
        .filter(|(c, _)| upstream.contains(*c))
        .map(|(_, name)| name.clone())
        .collect();
    create.sort();
    delete.sort();
    keep.sort();
    Diff { create, delete, keep }
}

/// Deterministic, <=63-char, collision-resistant child Object name (§6).
fn child_name(collection_name: &str, coordinate: &Coordinate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collection_name.as_bytes());
    hasher.update(coordinate.0.as_deref().unwrap_or("").as_bytes());
    hasher.update(coordinate.1.as_bytes());
    let suffix = format!("{:x}", hasher.finalize());
    let suffix = &suffix[..12];
    let budget = 63usize.saturating_sub(suffix.len() + 1);
    let prefix: String = collection_name.chars().take(budget.max(1)).collect();
    format!("{prefix}-{suffix}")
}

/// `uniform(-jitter,+jitter) * percentage/100` applied to `base` (§4.8 step
/// 5). `sample` is the uniform draw in `[-1.0, 1.0]`, taken as a parameter so
/// the formula itself is unit-testable without stubbing an RNG.
pub fn jittered_interval(base: Duration, jitter: Duration, percentage: f64, sample: f64) -> Duration {
    let delta = jitter.as_secs_f64() * sample * (percentage / 100.0);
    Duration::from_secs_f64((base.as_secs_f64() + delta).max(0.0))
}

fn poll_interval() -> Duration {
    let sample = rand::thread_rng().gen_range(-1.0..=1.0);
    jittered_interval(POLL_BASE, POLL_JITTER, POLL_JITTER_PERCENTAGE, sample)
}

fn target_api(
    client: &Client,
    spec: &ObservedObjectCollectionSpec,
) -> Result<Api<DynamicObject>, Error> {
    let type_meta = TypeMeta {
        api_version: spec.api_version.clone(),
        kind: spec.kind.clone(),
    };
    let gvk = GroupVersionKind::try_from(&type_meta)
        .map_err(|e| Error::Config(format!("invalid Collection apiVersion/kind: {e}")))?;
    let resource = kube::api::ApiResource::from_gvk(&gvk);
    Ok(match spec.namespace.as_deref() {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &resource),
        None => Api::all_with(client.clone(), &resource),
    })
}

/// Converts `matchLabels`/`matchExpressions` into the label-selector query
/// string the API server's list endpoint expects. Supports `In`, `NotIn`,
/// `Exists`, `DoesNotExist`; any other operator is skipped (documented
/// simplification — spec.md's matching examples only use `matchLabels`).
fn selector_query(selector: &k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(match_labels) = &selector.match_labels {
        for (k, v) in match_labels {
            clauses.push(format!("{k}={v}"));
        }
    }
    if let Some(expressions) = &selector.match_expressions {
        for expr in expressions {
            match expr.operator.as_str() {
                "In" => {
                    let values = expr.values.clone().unwrap_or_default().join(",");
                    clauses.push(format!("{} in ({})", expr.key, values));
                }
                "NotIn" => {
                    let values = expr.values.clone().unwrap_or_default().join(",");
                    clauses.push(format!("{} notin ({})", expr.key, values));
                }
                "Exists" => clauses.push(expr.key.clone()),
                "DoesNotExist" => clauses.push(format!("!{}", expr.key)),
                _ => {}
            }
        }
    }
    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(","))
    }
}

async fn list_upstream(
    target_client: &Client,
    spec: &ObservedObjectCollectionSpec,
) -> Result<BTreeSet<Coordinate>, Error> {
    let api = target_api(target_client, spec)?;
    let mut params = ListParams::default();
    if let Some(selector) = &spec.label_selector {
        if let Some(query) = selector_query(selector) {
            params = params.labels(&query);
        }
    }
    let list = api.list(&params).await.map_err(Error::RemoteTransient)?;
    Ok(list
        .items
        .into_iter()
        .filter_map(|item| item.metadata.name.map(|name| (item.metadata.namespace, name)))
        .collect())
}

/// Existing children, keyed by the upstream coordinate their embedded
/// manifest's `metadata.{namespace,name}` records (§4.8 step 3).
async fn list_children(
    client: &Client,
    collection_name: &str,
) -> Result<BTreeMap<Coordinate, String>, Error> {
    let api: Api<Object> = Api::all(client.clone());
    let params = ListParams::default().labels(&format!("{}={}", membership_label_key(), collection_name));
    let list = api.list(&params).await.map_err(Error::RemoteTransient)?;
    let mut children = BTreeMap::new();
    for child in list.items {
        let Some(name) = child.metadata.name.clone() else {
            continue;
        };
        let manifest_value: serde_json::Value = match serde_json::from_slice(&child.spec.fields.for_provider.manifest.raw) {
            Ok(v) => v,
            Err(_) => continue,
        };
        let ns = manifest_value
            .pointer("/metadata/namespace")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let Some(upstream_name) = manifest_value
            .pointer("/metadata/name")
            .and_then(|v| v.as_str())
        else {
            continue;
        };
        children.insert((ns, upstream_name.to_string()), name);
    }
    Ok(children)
}

fn build_child(
    collection_name: &str,
    spec: &ObservedObjectCollectionSpec,
    coordinate: &Coordinate,
) -> Result<Object, Error> {
    let manifest_value = serde_json::json!({
        "apiVersion": spec.api_version,
        "kind": spec.kind,
        "metadata": {
            "name": coordinate.1,
            "namespace": coordinate.0,
        },
    });
    let fields = ObjectSpecFields {
        provider_config_ref: spec.provider_config_ref.clone(),
        for_provider: ForProvider {
            manifest: Manifest {
                raw: serde_json::to_vec(&manifest_value)?,
            },
        },
        references: Vec::new(),
        readiness: ReadinessPolicy::default(),
        watch: false,
        connection_details: Vec::new(),
        management_actions: [ManagementAction::Observe].into_iter().collect(),
        deletion_policy: DeletionPolicy::Orphan,
    };
    let name = child_name(collection_name, coordinate);
    let mut child = Object::new(&name, ObjectSpec { fields });
    child.metadata = ObjectMeta {
        name: Some(name),
        labels: Some(template_labels(collection_name, &spec.object_template)),
        annotations: non_empty(spec.object_template.annotations.clone()),
        ..Default::default()
    };
    Ok(child)
}

fn template_labels(collection_name: &str, template: &ObjectTemplate) -> BTreeMap<String, String> {
    let mut labels = template.labels.clone();
    labels.insert(membership_label_key(), collection_name.to_string());
    labels
}

fn non_empty(map: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Full async reconcile entry point for one ObservedObjectCollection (§4.8).
pub async fn reconcile(
    ctx: &Context,
    collection_name: &str,
    spec: &ObservedObjectCollectionSpec,
    mut status: ObservedObjectCollectionStatus,
) -> Result<(ObservedObjectCollectionStatus, Action), Error> {
    let target_client = resolve_client(ctx, None, &spec.provider_config_ref).await?;

    if status.membership_label.is_none() {
        status.membership_label = Some(
            [(membership_label_key(), collection_name.to_string())]
                .into_iter()
                .collect(),
        );
    }

    let upstream = list_upstream(&target_client, spec).await?;
    let children = list_children(&ctx.client, collection_name).await?;
    let plan = diff(&upstream, &children);

    let api: Api<Object> = Api::all(ctx.client.clone());
    for coordinate in &plan.create {
        let child = build_child(collection_name, spec, coordinate)?;
        let name = child.metadata.name.clone().expect("build_child always sets a name");
        api.patch(
            &name,
            &PatchParams::apply(&format!("collection-by-{collection_name}")).force(),
            &Patch::Apply(serde_json::to_value(&child)?),
        )
        .await
        .map_err(Error::RemoteTransient)?;
    }
    for name in &plan.delete {
        match api.delete(name, &Default::default()).await {
            Ok(_) => {}
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(Error::RemoteTransient(e)),
        }
    }
    for name in &plan.keep {
        let desired_labels = template_labels(collection_name, &spec.object_template);
        let current = api.get(name).await.map_err(Error::RemoteTransient)?;
        if current.metadata.labels.as_ref() != Some(&desired_labels) {
            let patch = serde_json::json!({ "metadata": { "labels": desired_labels } });
            api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .map_err(Error::RemoteTransient)?;
        }
    }

    watch_target(ctx, collection_name, spec);

    Ok((status, Action::requeue(poll_interval())))
}

/// `WatchResources(pc, GVK)` for the Collection's own target type (§4.7):
/// used as a hint to wake the poll loop sooner on upstream changes, not a
/// replacement for the jittered poll itself.
fn watch_target(ctx: &Context, collection_name: &str, spec: &ObservedObjectCollectionSpec) {
    let object_id = ObjectId {
        namespace: None,
        name: collection_name.to_string(),
    };
    let type_meta = TypeMeta {
        api_version: spec.api_version.clone(),
        kind: spec.kind.clone(),
    };
    let Ok(gvk) = GroupVersionKind::try_from(&type_meta) else {
        ctx.informers.watch_resources(object_id, Vec::new(), Vec::new());
        return;
    };
    let identity = provider_config_identity(None, &spec.provider_config_ref);
    let key = InformerKey {
        provider_config_identity: identity,
        gvk,
    };
    ctx.informers.watch_resources(object_id, vec![key], Vec::new());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(ns: Option<&str>, name: &str) -> Coordinate {
        (ns.map(str::to_string), name.to_string())
    }

    /// Invariant 6: the child-Object set converges to exactly the upstream
    /// set, as (namespace,name) pairs.
    #[test]
    fn invariant_diff_converges_membership() {
        let upstream: BTreeSet<Coordinate> = [
            coord(Some("ns"), "a"),
            coord(Some("ns"), "b"),
            coord(None, "cluster-scoped"),
        ]
        .into_iter()
        .collect();
        let children: BTreeMap<Coordinate, String> = [
            (coord(Some("ns"), "a"), "child-a".to_string()),
            (coord(Some("ns"), "stale"), "child-stale".to_string()),
        ]
        .into_iter()
        .collect();

        let result = diff(&upstream, &children);
        assert_eq!(result.keep, vec!["child-a".to_string()]);
        assert_eq!(result.delete, vec!["child-stale".to_string()]);
        assert_eq!(
            result.create,
            vec![coord(Some("ns"), "b"), coord(None, "cluster-scoped")]
        );
    }

    #[test]
    fn diff_is_empty_in_steady_state() {
        let upstream: BTreeSet<Coordinate> = [coord(Some("ns"), "a")].into_iter().collect();
        let children: BTreeMap<Coordinate, String> =
            [(coord(Some("ns"), "a"), "child-a".to_string())].into_iter().collect();
        let result = diff(&upstream, &children);
        assert!(result.create.is_empty());
        assert!(result.delete.is_empty());
        assert_eq!(result.keep, vec!["child-a".to_string()]);
    }

    #[test]
    fn child_name_is_stable_and_bounded() {
        let collection_name = "a".repeat(100);
        let name = child_name(&collection_name, &coord(Some("ns"), "x"));
        assert!(name.len() <= 63);
        assert_eq!(name, child_name(&collection_name, &coord(Some("ns"), "x")));
        assert_ne!(name, child_name(&collection_name, &coord(Some("ns"), "y")));
    }

    #[test]
    fn jitter_formula_stays_within_bounds() {
        let base = Duration::from_secs(300);
        let jitter = Duration::from_secs(60);
        let high = jittered_interval(base, jitter, 50.0, 1.0);
        let low = jittered_interval(base, jitter, 50.0, -1.0);
        assert_eq!(high, Duration::from_secs(330));
        assert_eq!(low, Duration::from_secs(270));
    }

    #[test]
    fn selector_query_combines_match_labels_and_expressions() {
        use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
        let selector = LabelSelector {
            match_labels: Some([("app".to_string(), "web".to_string())].into_iter().collect()),
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_string(),
                operator: "In".to_string(),
                values: Some(vec!["frontend".to_string(), "backend".to_string()]),
            }]),
        };
        let query = selector_query(&selector).unwrap();
        assert!(query.contains("app=web"));
        assert!(query.contains("tier in (frontend,backend)"));
    }
}
