//! Manifest parser (§4.2): decode the embedded raw manifest to an
//! unstructured object, default its name, and validate it has enough of a
//! GVK to be applied.

use kube::api::{DynamicObject, ObjectMeta};

use crate::api::common::Manifest;
use crate::error::Error;

/// Decodes `manifest.raw` as JSON, stamping `metadata.name` from
/// `object_name` when the manifest doesn't already set one. Fails with
/// [`Error::UnmarshalTemplate`] if the bytes aren't valid JSON or the result
/// lacks `kind`/`apiVersion` (§4.2, §3 invariant).
pub fn parse_manifest(object_name: &str, manifest: &Manifest) -> Result<DynamicObject, Error> {
    let mut obj: DynamicObject = serde_json::from_slice(&manifest.raw)
        .map_err(|e| Error::UnmarshalTemplate(e.to_string()))?;

    if obj.types.as_ref().map(|t| t.kind.is_empty()).unwrap_or(true) {
        return Err(Error::UnmarshalTemplate(
            "manifest is missing kind".to_string(),
        ));
    }
    if obj
        .types
        .as_ref()
        .map(|t| t.api_version.is_empty())
        .unwrap_or(true)
    {
        return Err(Error::UnmarshalTemplate(
            "manifest is missing apiVersion".to_string(),
        ));
    }

    if obj.metadata.name.as_deref().unwrap_or_default().is_empty() {
        obj.metadata = ObjectMeta {
            name: Some(object_name.to_string()),
            ..obj.metadata
        };
    }

    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(json: &serde_json::Value) -> Manifest {
        Manifest {
            raw: serde_json::to_vec(json).unwrap(),
        }
    }

    #[test]
    fn defaults_name_from_object() {
        let m = manifest(&serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
        }));
        let obj = parse_manifest("my-object", &m).unwrap();
        assert_eq!(obj.metadata.name.as_deref(), Some("my-object"));
    }

    #[test]
    fn keeps_explicit_name() {
        let m = manifest(&serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "explicit"},
        }));
        let obj = parse_manifest("my-object", &m).unwrap();
        assert_eq!(obj.metadata.name.as_deref(), Some("explicit"));
    }

    #[test]
    fn rejects_invalid_json() {
        let m = Manifest {
            raw: b"not json".to_vec(),
        };
        let err = parse_manifest("my-object", &m).unwrap_err();
        assert!(matches!(err, Error::UnmarshalTemplate(_)));
    }

    #[test]
    fn rejects_missing_kind() {
        let m = manifest(&serde_json::json!({"apiVersion": "v1"}));
        let err = parse_manifest("my-object", &m).unwrap_err();
        assert!(matches!(err, Error::UnmarshalTemplate(_)));
    }

    #[test]
    fn rejects_missing_api_version() {
        let m = manifest(&serde_json::json!({"kind": "ConfigMap"}));
        let err = parse_manifest("my-object", &m).unwrap_err();
        assert!(matches!(err, Error::UnmarshalTemplate(_)));
    }
}
