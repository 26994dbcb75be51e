//! Client-side-apply syncer (§4.5): diff against the
//! `kubectl.kubernetes.io/last-applied-configuration` annotation, then
//! three-way merge patch.

use kube::api::{Api, DynamicObject, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::Value;

use crate::error::Error;

use super::Syncer;

pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

pub struct CsaSyncer;

impl Syncer for CsaSyncer {
    async fn get_observed_state(
        &self,
        _client: &Client,
        current: &DynamicObject,
    ) -> Result<Option<DynamicObject>, Error> {
        let Some(raw) = current
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(LAST_APPLIED_ANNOTATION))
        else {
            return Ok(None);
        };
        let observed: DynamicObject = serde_json::from_str(raw)
            .map_err(|e| Error::UnmarshalTemplate(e.to_string()))?;
        Ok(Some(observed))
    }

    async fn get_desired_state(
        &self,
        _client: &Client,
        manifest: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        Ok(manifest.clone())
    }

    async fn sync_resource(
        &self,
        client: &Client,
        current: Option<&DynamicObject>,
        desired: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let raw = serde_json::to_string(desired)?;
        let mut patched = desired.clone();
        patched
            .metadata
            .annotations
            .get_or_insert_with(Default::default)
            .insert(LAST_APPLIED_ANNOTATION.to_string(), raw);

        let api: Api<DynamicObject> = namespaced_or_cluster(client, current.unwrap_or(desired))?;
        let name = desired
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::UnmarshalTemplate("manifest is missing name".to_string()))?;

        let result = match current {
            Some(_) => {
                let value: Value = serde_json::to_value(&patched)?;
                api.patch(name, &PatchParams::default(), &Patch::Strategic(value))
                    .await
                    .map_err(Error::RemoteTransient)?
            }
            None => api
                .create(&PostParams::default(), &patched)
                .await
                .map_err(Error::RemoteTransient)?,
        };
        Ok(result)
    }
}

pub(crate) fn namespaced_or_cluster(
    client: &Client,
    current: &DynamicObject,
) -> Result<Api<DynamicObject>, Error> {
    let type_meta = current
        .types
        .as_ref()
        .ok_or_else(|| Error::UnmarshalTemplate("manifest is missing kind".to_string()))?;
    let gvk = kube::core::GroupVersionKind::try_from(type_meta)
        .map_err(|e| Error::UnmarshalTemplate(format!("invalid manifest apiVersion/kind: {e}")))?;
    let resource = kube::api::ApiResource::from_gvk(&gvk);
    Ok(match current.metadata.namespace.as_deref() {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &resource),
        None => Api::all_with(client.clone(), &resource),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn manifest_with_annotation(raw: &str) -> DynamicObject {
        let mut obj = DynamicObject::new(
            "example",
            &kube::api::ApiResource::from_gvk(&kube::core::GroupVersionKind::gvk(
                "", "v1", "ConfigMap",
            )),
        );
        obj.metadata = ObjectMeta {
            name: Some("example".to_string()),
            annotations: Some(
                [(LAST_APPLIED_ANNOTATION.to_string(), raw.to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        obj
    }

    #[tokio::test]
    async fn observed_state_decodes_last_applied_annotation() {
        let current = manifest_with_annotation(
            r#"{"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"example"}}"#,
        );
        let (client, _handle) = tower_test_client();
        let observed = CsaSyncer.get_observed_state(&client, &current).await.unwrap();
        assert!(observed.is_some());
        assert_eq!(observed.unwrap().metadata.name.as_deref(), Some("example"));
    }

    #[tokio::test]
    async fn observed_state_is_none_without_annotation() {
        let current = DynamicObject::new(
            "example",
            &kube::api::ApiResource::from_gvk(&kube::core::GroupVersionKind::gvk(
                "", "v1", "ConfigMap",
            )),
        );
        let (client, _handle) = tower_test_client();
        let observed = CsaSyncer.get_observed_state(&client, &current).await.unwrap();
        assert!(observed.is_none());
    }

    fn tower_test_client() -> (
        Client,
        tower_test::mock::Handle<http::Request<kube::client::Body>, http::Response<kube::client::Body>>,
    ) {
        let (mock_service, handle) = tower_test::mock::pair();
        let client = Client::new(mock_service, "default");
        (client, handle)
    }
}
