//! Reference resolver (§4.3): fetch referenced control-plane objects,
//! evaluate field-path extractions, and patch values into the in-memory
//! desired manifest before apply.

use kube::api::{Api, ApiResource, DynamicObject};
use kube::core::{GroupVersionKind, TypeMeta};
use kube::Client;
use serde_json::Value;

use crate::api::common::{DependsOn, Reference};
use crate::error::Error;

/// A dotted field path (`a.b.c`), evaluated/patched with standard
/// object-traversal semantics — no array indices or wildcards (§4.3).
pub struct FieldPath<'a>(&'a str);

impl<'a> FieldPath<'a> {
    pub fn new(path: &'a str) -> Self {
        FieldPath(path)
    }

    fn segments(&self) -> impl Iterator<Item = &'a str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Reads the value at this path, or `None` if any segment is missing.
    pub fn eval(&self, root: &Value) -> Option<Value> {
        let mut current = root;
        for segment in self.segments() {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Writes `value` at this path, creating intermediate objects as needed.
    pub fn patch(&self, root: &mut Value, value: Value) {
        let segments: Vec<&str> = self.segments().collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut current = root;
        for segment in parents {
            if !current.is_object() {
                *current = Value::Object(Default::default());
            }
            current = current
                .as_object_mut()
                .expect("just coerced to object")
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
        }
        if !current.is_object() {
            *current = Value::Object(Default::default());
        }
        current
            .as_object_mut()
            .expect("just coerced to object")
            .insert(last.to_string(), value);
    }
}

/// A single field patched into the desired manifest by [`resolve_references`].
pub struct ResolvedPatch {
    pub to_field_path: String,
    pub value: Value,
}

pub(crate) fn api_for(
    client: &Client,
    depends_on: &DependsOn,
    namespace: Option<&str>,
) -> Result<Api<DynamicObject>, Error> {
    let type_meta = TypeMeta {
        api_version: depends_on.api_version.clone(),
        kind: depends_on.kind.clone(),
    };
    let gvk = GroupVersionKind::try_from(&type_meta)
        .map_err(|e| Error::Config(format!("invalid reference apiVersion/kind: {e}")))?;
    let resource = ApiResource::from_gvk(&gvk);
    Ok(match depends_on.namespace.as_deref().or(namespace) {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &resource),
        None => Api::all_with(client.clone(), &resource),
    })
}

/// Resolves every [`Reference`] against the control plane (not the remote
/// cluster, §4.3) and returns the patches a `PatchesFrom` reference produces.
/// Plain `DependsOn` references only need to exist (they're for GC/indexing,
/// §4.7) and produce no patch.
///
/// Fails with [`Error::ReferenceNotReady`] — a non-fatal, requeue-and-retry
/// signal — if any referenced object doesn't exist yet, or a `PatchesFrom`
/// field path doesn't resolve to a concrete value.
pub async fn resolve_references(
    client: &Client,
    namespace: Option<&str>,
    references: &[Reference],
) -> Result<Vec<ResolvedPatch>, Error> {
    let mut patches = Vec::with_capacity(references.len());
    for reference in references {
        let depends_on = reference.depends_on();
        let api = api_for(client, depends_on, namespace)?;
        let object = api.get(&depends_on.name).await.map_err(|e| match e {
            kube::Error::Api(ae) if ae.code == 404 => Error::ReferenceNotReady(format!(
                "referenced {} {} not found",
                depends_on.kind, depends_on.name
            )),
            other => Error::Kube(other),
        })?;

        if let Reference::PatchesFrom(patches_from) = reference {
            let source = serde_json::to_value(&object)?;
            let value = FieldPath::new(&patches_from.field_path)
                .eval(&source)
                .ok_or_else(|| {
                    Error::ReferenceNotReady(format!(
                        "field path {} not yet resolvable on {} {}",
                        patches_from.field_path, depends_on.kind, depends_on.name
                    ))
                })?;
            patches.push(ResolvedPatch {
                to_field_path: patches_from.to_field_path().to_string(),
                value,
            });
        }
    }
    Ok(patches)
}

/// Applies resolved patches onto `spec.forProvider.manifest.<path>` of the
/// desired manifest (§3, §4.3).
pub fn apply_patches(manifest: &mut Value, patches: &[ResolvedPatch]) {
    for patch in patches {
        FieldPath::new(&patch.to_field_path).patch(manifest, patch.value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_reads_nested_dotted_path() {
        let value = serde_json::json!({"data": {"password": "QUJD"}});
        let got = FieldPath::new("data.password").eval(&value);
        assert_eq!(got, Some(serde_json::json!("QUJD")));
    }

    #[test]
    fn eval_missing_path_is_none() {
        let value = serde_json::json!({"data": {}});
        assert_eq!(FieldPath::new("data.password").eval(&value), None);
    }

    /// E6: PatchesFrom{Kind:Secret,Name:src,FieldPath:"data.password"}, no
    /// ToFieldPath; after resolution `data.password=QUJD` lands at that same
    /// path in the desired manifest.
    #[test]
    fn e6_patch_writes_to_default_field_path() {
        let mut manifest = serde_json::json!({"apiVersion": "v1", "kind": "Secret"});
        let patches = vec![ResolvedPatch {
            to_field_path: "data.password".to_string(),
            value: serde_json::json!("QUJD"),
        }];
        apply_patches(&mut manifest, &patches);
        assert_eq!(manifest["data"]["password"], serde_json::json!("QUJD"));
    }

    #[test]
    fn patch_creates_intermediate_objects() {
        let mut manifest = serde_json::json!({});
        FieldPath::new("spec.forProvider.manifest.data.password")
            .patch(&mut manifest, serde_json::json!("QUJD"));
        assert_eq!(
            manifest["spec"]["forProvider"]["manifest"]["data"]["password"],
            serde_json::json!("QUJD")
        );
    }
}
