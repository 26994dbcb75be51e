#[cfg(all(test, feature = "e2e-tests"))]
mod test {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::{Api, Patch, PatchParams, PostParams};
    use kube::client::Client;
    use kube::runtime::wait::{await_condition, conditions, Condition};
    use kube::ResourceExt;
    use serde_json::json;
    use tokio::time::timeout;

    use provider_kubernetes::api::common::{ConnectionDetail, ManagementAction, Manifest, ReadinessPolicy};
    use provider_kubernetes::api::object::{ForProvider, Object, ObjectSpec, ObjectSpecFields};
    use provider_kubernetes::api::provider_config::{
        ClusterProviderConfig, ClusterProviderConfigSpec,
    };

    fn is_synced_and_ready() -> impl Condition<Object> {
        |obj: Option<&Object>| {
            let Some(status) = obj.and_then(|o| o.status.as_ref()) else {
                return false;
            };
            ["Synced", "Ready"]
                .iter()
                .all(|t| status.conditions.iter().any(|c| &c.type_ == t && c.status == "True"))
        }
    }

    fn is_not_ready() -> impl Condition<Object> {
        |obj: Option<&Object>| {
            let Some(status) = obj.and_then(|o| o.status.as_ref()) else {
                return true;
            };
            match status.conditions.iter().find(|c| c.type_ == "Ready") {
                Some(c) => c.status != "True",
                None => true,
            }
        }
    }

    fn configmap_exists() -> impl Condition<ConfigMap> {
        |obj: Option<&ConfigMap>| obj.is_some()
    }

    async fn wait_for<R, C>(api: Api<R>, name: &str, condition: C)
    where
        R: kube::Resource
            + Clone
            + std::fmt::Debug
            + for<'de> k8s_openapi::serde::Deserialize<'de>
            + 'static
            + Send,
        C: Condition<R>,
    {
        timeout(Duration::from_secs(30), await_condition(api, name, condition))
            .await
            .unwrap()
            .unwrap();
    }

    /// A self-targeting `ClusterProviderConfig`: the provider reconciles
    /// Objects against the same cluster it runs on.
    async fn ensure_provider_config(client: Client, name: &str) {
        let api: Api<ClusterProviderConfig> = Api::all(client);
        let pc = ClusterProviderConfig::new(
            name,
            ClusterProviderConfigSpec {
                fields: provider_kubernetes::api::provider_config::ProviderConfigSpecFields {
                    credentials: provider_kubernetes_client::CredentialsSource::InjectedIdentity,
                    identity: None,
                },
            },
        );
        let _ = api.create(&PostParams::default(), &pc).await;
    }

    fn configmap_manifest(name: &str) -> Manifest {
        let raw = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": name, "namespace": "default" },
            "data": { "hello": "world" }
        });
        Manifest {
            raw: serde_json::to_vec(&raw).unwrap(),
        }
    }

    async fn setup(name: &str) -> (Api<Object>, Api<ConfigMap>) {
        let client = Client::try_default().await.unwrap();
        ensure_provider_config(client.clone(), "e2e-self").await;

        let object = Object::new(
            name,
            ObjectSpec {
                fields: ObjectSpecFields {
                    provider_config_ref: provider_kubernetes::api::provider_config::ProviderConfigReference {
                        name: "e2e-self".to_string(),
                    },
                    for_provider: ForProvider {
                        manifest: configmap_manifest(name),
                    },
                    references: Vec::new(),
                    readiness: ReadinessPolicy::SuccessfulCreate,
                    watch: false,
                    connection_details: Vec::<ConnectionDetail>::new(),
                    management_actions: BTreeSet::from([ManagementAction::All]),
                    deletion_policy: Default::default(),
                },
            },
        );

        let object_api: Api<Object> = Api::all(client.clone());
        object_api.create(&PostParams::default(), &object).await.unwrap();

        let configmap_api: Api<ConfigMap> = Api::namespaced(client, "default");
        wait_for(object_api.clone(), name, is_synced_and_ready()).await;
        wait_for(configmap_api.clone(), name, configmap_exists()).await;
        (object_api, configmap_api)
    }

    #[tokio::test]
    async fn object_create() {
        let name = "e2e-object-create";
        setup(name).await;
    }

    #[tokio::test]
    async fn object_delete() {
        let name = "e2e-object-delete";
        let (object_api, configmap_api) = setup(name).await;

        let configmap = configmap_api.get(name).await.unwrap();
        let object = object_api.get(name).await.unwrap();
        object_api.delete(name, &Default::default()).await.unwrap();

        wait_for(object_api.clone(), name, conditions::is_deleted(&object.uid().unwrap())).await;
        wait_for(
            configmap_api.clone(),
            name,
            conditions::is_deleted(&configmap.uid().unwrap()),
        )
        .await;
    }

    #[tokio::test]
    async fn object_drift_is_corrected() {
        let name = "e2e-object-drift";
        let (object_api, configmap_api) = setup(name).await;

        let mut configmap = configmap_api.get(name).await.unwrap();
        configmap.data.get_or_insert_with(Default::default).insert(
            "hello".to_string(),
            "tampered".to_string(),
        );
        configmap.metadata.managed_fields = None;
        configmap_api
            .patch(name, &PatchParams::apply("e2e-tests").force(), &Patch::Apply(&configmap))
            .await
            .unwrap();

        wait_for(object_api.clone(), name, is_not_ready()).await;
        wait_for(object_api.clone(), name, is_synced_and_ready()).await;

        let corrected = configmap_api.get(name).await.unwrap();
        assert_eq!(corrected.data.unwrap().get("hello").unwrap(), "world");
    }

    #[tokio::test]
    async fn object_observe_only_does_not_create() {
        let name = "e2e-object-observe-only";
        let client = Client::try_default().await.unwrap();
        ensure_provider_config(client.clone(), "e2e-self").await;

        let object = Object::new(
            name,
            ObjectSpec {
                fields: ObjectSpecFields {
                    provider_config_ref: provider_kubernetes::api::provider_config::ProviderConfigReference {
                        name: "e2e-self".to_string(),
                    },
                    for_provider: ForProvider {
                        manifest: configmap_manifest(name),
                    },
                    references: Vec::new(),
                    readiness: ReadinessPolicy::SuccessfulCreate,
                    watch: false,
                    connection_details: Vec::<ConnectionDetail>::new(),
                    management_actions: BTreeSet::from([ManagementAction::Observe]),
                    deletion_policy: Default::default(),
                },
            },
        );

        let object_api: Api<Object> = Api::all(client.clone());
        object_api.create(&PostParams::default(), &object).await.unwrap();

        let configmap_api: Api<ConfigMap> = Api::namespaced(client, "default");
        timeout(Duration::from_secs(10), await_condition(configmap_api, name, configmap_exists()))
            .await
            .expect_err("ObjectNotExists should never be created under Observe-only policy");
    }
}
