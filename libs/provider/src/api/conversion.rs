//! Version converter (§4.9). v1alpha2 is the hub; v1alpha1 and v1beta1 each
//! convert through it. The forward/backward mapping between the legacy
//! singleton `ManagementPolicy` and the set-valued `ManagementActions` lives
//! here as plain functions so both the `TryFrom` impls below and the
//! conversion-webhook entry point ([`review::convert`]) can share them.

use std::collections::BTreeSet;

use crate::error::Error;

use super::common::ManagementAction;
use super::object_v1alpha1::{self, ManagementPolicy};

/// Forward mapping: legacy singleton -> set (§4.9 "Forward mapping" table).
/// Infallible: every [`ManagementPolicy`] variant already typechecked during
/// deserialization, so there is no "unknown" case left to reject here (that
/// only arises from raw wire strings — see [`forward_str`]).
pub fn forward(policy: &ManagementPolicy) -> BTreeSet<ManagementAction> {
    use ManagementAction::*;
    match policy {
        ManagementPolicy::Default | ManagementPolicy::Empty => BTreeSet::from([All]),
        ManagementPolicy::ObserveCreateUpdate => BTreeSet::from([Observe, Create, Update]),
        ManagementPolicy::ObserveDelete => BTreeSet::from([Observe, Delete]),
        ManagementPolicy::Observe => BTreeSet::from([Observe]),
    }
}

/// The legacy API also accepts arbitrary wire strings that don't deserialize
/// into [`ManagementPolicy`] at all; `forward_str` is what the webhook path
/// exercises so "any other" (§4.9) can actually be reached.
pub fn forward_str(policy: &str) -> Result<BTreeSet<ManagementAction>, Error> {
    match policy {
        "Default" | "" => Ok(BTreeSet::from([ManagementAction::All])),
        "ObserveCreateUpdate" => Ok(BTreeSet::from([
            ManagementAction::Observe,
            ManagementAction::Create,
            ManagementAction::Update,
        ])),
        "ObserveDelete" => Ok(BTreeSet::from([
            ManagementAction::Observe,
            ManagementAction::Delete,
        ])),
        "Observe" => Ok(BTreeSet::from([ManagementAction::Observe])),
        other => Err(Error::UnknownManagementPolicy(other.to_string())),
    }
}

/// Backward mapping: set -> legacy singleton (§4.9 "Backward mapping",
/// first-match-wins). `creation_timestamp_zero` models rule 6, "object is
/// newly created"; callers pass whether `metadata.creationTimestamp` is unset.
pub fn backward(
    actions: &BTreeSet<ManagementAction>,
    creation_timestamp_zero: bool,
) -> ManagementPolicy {
    use ManagementAction::*;

    if actions.contains(&All) {
        return ManagementPolicy::Default;
    }
    if actions.is_superset(&BTreeSet::from([Observe, Create, Update, Delete])) {
        return ManagementPolicy::Default;
    }
    if actions == &BTreeSet::from([Observe, Create, Update]) {
        return ManagementPolicy::ObserveCreateUpdate;
    }
    if actions == &BTreeSet::from([Observe, Delete]) {
        return ManagementPolicy::ObserveDelete;
    }
    if actions == &BTreeSet::from([Observe]) {
        return ManagementPolicy::Observe;
    }
    if actions.is_empty() && creation_timestamp_zero {
        return ManagementPolicy::Default;
    }
    // Rule 7: leave unsupported combinations empty rather than failing, so
    // round-tripping a policy the legacy API can't express doesn't error.
    ManagementPolicy::Empty
}

/// Converts a v1alpha1 spec into the v1alpha2 hub shape (§4.9).
impl From<&object_v1alpha1::ObjectSpecFields> for super::object::ObjectSpecFields {
    fn from(src: &object_v1alpha1::ObjectSpecFields) -> Self {
        Self {
            provider_config_ref: src.provider_config_ref.clone(),
            for_provider: super::object::ForProvider {
                manifest: src.for_provider.manifest.clone(),
            },
            references: src.references.clone(),
            readiness: src.readiness,
            watch: src.watch,
            connection_details: src.connection_details.clone(),
            management_actions: forward(&src.management_policy),
            deletion_policy: src.deletion_policy,
        }
    }
}

/// Converts the v1alpha2 hub back into v1alpha1 (§4.9 backward mapping).
/// `creation_timestamp_zero` must reflect the destination object's current
/// `metadata.creationTimestamp`.
pub fn hub_to_v1alpha1(
    src: &super::object::ObjectSpecFields,
    creation_timestamp_zero: bool,
) -> object_v1alpha1::ObjectSpecFields {
    object_v1alpha1::ObjectSpecFields {
        provider_config_ref: src.provider_config_ref.clone(),
        for_provider: object_v1alpha1::ForProvider {
            manifest: src.for_provider.manifest.clone(),
        },
        references: src.references.clone(),
        readiness: src.readiness,
        watch: src.watch,
        connection_details: src.connection_details.clone(),
        management_policy: backward(&src.management_actions, creation_timestamp_zero),
        deletion_policy: src.deletion_policy,
    }
}

/// v1beta1 carries the identical set-valued vocabulary as the hub, so
/// conversion is a plain field-for-field copy (§4.9).
impl From<&super::object_v1beta1::ObjectSpecFields> for super::object::ObjectSpecFields {
    fn from(src: &super::object_v1beta1::ObjectSpecFields) -> Self {
        Self {
            provider_config_ref: src.provider_config_ref.clone(),
            for_provider: super::object::ForProvider {
                manifest: src.for_provider.manifest.clone(),
            },
            references: src.references.clone(),
            readiness: src.readiness,
            watch: src.watch,
            connection_details: src.connection_details.clone(),
            management_actions: src.management_policies.clone(),
            deletion_policy: src.deletion_policy,
        }
    }
}

impl From<&super::object::ObjectSpecFields> for super::object_v1beta1::ObjectSpecFields {
    fn from(src: &super::object::ObjectSpecFields) -> Self {
        Self {
            provider_config_ref: src.provider_config_ref.clone(),
            for_provider: super::object_v1beta1::ForProvider {
                manifest: src.for_provider.manifest.clone(),
            },
            references: src.references.clone(),
            readiness: src.readiness,
            watch: src.watch,
            connection_details: src.connection_details.clone(),
            management_policies: src.management_actions.clone(),
            deletion_policy: src.deletion_policy,
        }
    }
}

/// The conversion webhook entry point (§6 "Conversion webhook"). The HTTP
/// listener that serves it is out of scope (§1); only the pure conversion
/// function is specified here.
///
/// `ConversionReview`/`Request`/`Response` mirror the
/// `apiextensions.k8s.io/v1` wire shape the apiserver sends and expects
/// (the same shape `kube`'s own conversion-webhook support models) — defined
/// locally rather than imported, since neither `kube` nor `k8s-openapi`
/// exposes a stable typed form of this resource.
pub mod review {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use crate::error::Error;

    const HUB_API_VERSION: &str = "kubernetes.crossplane.io/v1alpha2";

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ConversionReview {
        #[serde(rename = "apiVersion")]
        pub api_version: String,
        pub kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub request: Option<ConversionRequest>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub response: Option<ConversionResponse>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ConversionRequest {
        pub uid: String,
        #[serde(rename = "desiredAPIVersion")]
        pub desired_api_version: String,
        pub objects: Vec<Value>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ConversionResponse {
        pub uid: String,
        pub result: Status,
        #[serde(rename = "convertedObjects")]
        pub converted_objects: Vec<Value>,
    }

    #[derive(Clone, Debug, Default, Serialize, Deserialize)]
    pub struct Status {
        pub status: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        pub message: String,
    }

    /// Converts every object in `review.request.objects` to `desired_api_version`,
    /// routing through the v1alpha2 hub, and returns a populated response review.
    pub fn convert(review: &ConversionReview, desired_api_version: &str) -> ConversionReview {
        let Some(request) = review.request.as_ref() else {
            return error_review(review, "missing conversion request");
        };
        match convert_objects(request, desired_api_version) {
            Ok(objects) => ConversionReview {
                api_version: review.api_version.clone(),
                kind: review.kind.clone(),
                request: None,
                response: Some(ConversionResponse {
                    uid: request.uid.clone(),
                    result: Status {
                        status: "Success".to_string(),
                        message: String::new(),
                    },
                    converted_objects: objects,
                }),
            },
            Err(e) => error_review(review, &e.redacted_message()),
        }
    }

    fn convert_objects(
        request: &ConversionRequest,
        desired_api_version: &str,
    ) -> Result<Vec<Value>, Error> {
        request
            .objects
            .iter()
            .map(|obj| convert_one(obj, desired_api_version))
            .collect()
    }

    fn convert_one(obj: &Value, desired_api_version: &str) -> Result<Value, Error> {
        let api_version = obj
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if api_version == desired_api_version {
            return Ok(obj.clone());
        }

        let hub = to_hub(obj, api_version)?;
        from_hub(hub, desired_api_version)
    }

    fn to_hub(obj: &Value, api_version: &str) -> Result<Value, Error> {
        match api_version {
            v if v == HUB_API_VERSION => Ok(obj.clone()),
            "kubernetes.crossplane.io/v1alpha1" => {
                let spec: super::object_v1alpha1::ObjectSpecFields =
                    serde_json::from_value(obj.get("spec").cloned().unwrap_or_default())?;
                let hub_spec: super::object::ObjectSpecFields = (&spec).into();
                with_spec(obj, &hub_spec, HUB_API_VERSION)
            }
            "kubernetes.crossplane.io/v1beta1" => {
                let spec: super::object_v1beta1::ObjectSpecFields =
                    serde_json::from_value(obj.get("spec").cloned().unwrap_or_default())?;
                let hub_spec: super::object::ObjectSpecFields = (&spec).into();
                with_spec(obj, &hub_spec, HUB_API_VERSION)
            }
            other => Err(Error::Config(format!("unknown source apiVersion {other}"))),
        }
    }

    fn from_hub(obj: Value, desired_api_version: &str) -> Result<Value, Error> {
        if desired_api_version == HUB_API_VERSION {
            return Ok(obj);
        }
        let hub_spec: super::object::ObjectSpecFields =
            serde_json::from_value(obj.get("spec").cloned().unwrap_or_default())?;

        match desired_api_version {
            "kubernetes.crossplane.io/v1alpha1" => {
                let creation_timestamp_zero = obj
                    .pointer("/metadata/creationTimestamp")
                    .map(Value::is_null)
                    .unwrap_or(true);
                let spec = super::hub_to_v1alpha1(&hub_spec, creation_timestamp_zero);
                with_spec(&obj, &spec, desired_api_version)
            }
            "kubernetes.crossplane.io/v1beta1" => {
                let spec: super::object_v1beta1::ObjectSpecFields = (&hub_spec).into();
                with_spec(&obj, &spec, desired_api_version)
            }
            other => Err(Error::Config(format!(
                "unknown destination apiVersion {other}"
            ))),
        }
    }

    fn with_spec<T: serde::Serialize>(
        obj: &Value,
        spec: &T,
        api_version: &str,
    ) -> Result<Value, Error> {
        let mut out = obj.clone();
        out["spec"] = serde_json::to_value(spec)?;
        out["apiVersion"] = Value::String(api_version.to_string());
        Ok(out)
    }

    fn error_review(review: &ConversionReview, message: &str) -> ConversionReview {
        ConversionReview {
            api_version: review.api_version.clone(),
            kind: review.kind.clone(),
            request: None,
            response: Some(ConversionResponse {
                uid: review
                    .request
                    .as_ref()
                    .map(|r| r.uid.clone())
                    .unwrap_or_default(),
                result: Status {
                    status: "Failure".to_string(),
                    message: message.to_string(),
                },
                converted_objects: Vec::new(),
            }),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn review_with(api_version: &str, objects: Vec<Value>) -> ConversionReview {
            ConversionReview {
                api_version: "apiextensions.k8s.io/v1".to_string(),
                kind: "ConversionReview".to_string(),
                request: Some(ConversionRequest {
                    uid: "test-uid".to_string(),
                    desired_api_version: api_version.to_string(),
                    objects,
                }),
                response: None,
            }
        }

        #[test]
        fn converts_v1alpha1_object_to_hub() {
            let obj = serde_json::json!({
                "apiVersion": "kubernetes.crossplane.io/v1alpha1",
                "kind": "Object",
                "metadata": {"name": "example"},
                "spec": {
                    "providerConfigRef": {"name": "default"},
                    "forProvider": {"manifest": {"apiVersion": "v1", "kind": "ConfigMap"}},
                    "managementPolicy": "ObserveCreateUpdate",
                },
            });
            let review = review_with("kubernetes.crossplane.io/v1alpha2", vec![obj]);
            let out = convert(&review, "kubernetes.crossplane.io/v1alpha2");
            let response = out.response.unwrap();
            assert_eq!(response.result.status, "Success");
            let converted = &response.converted_objects[0];
            assert_eq!(converted["apiVersion"], "kubernetes.crossplane.io/v1alpha2");
            let actions = converted["spec"]["managementActions"].as_array().unwrap();
            assert_eq!(actions.len(), 3);
        }

        #[test]
        fn rejects_unknown_legacy_policy() {
            let obj = serde_json::json!({
                "apiVersion": "kubernetes.crossplane.io/v1alpha1",
                "kind": "Object",
                "metadata": {"name": "example"},
                "spec": {
                    "providerConfigRef": {"name": "default"},
                    "forProvider": {"manifest": {"apiVersion": "v1", "kind": "ConfigMap"}},
                    "managementPolicy": "unknown",
                },
            });
            let review = review_with("kubernetes.crossplane.io/v1alpha2", vec![obj]);
            let out = convert(&review, "kubernetes.crossplane.io/v1alpha2");
            let response = out.response.unwrap();
            assert_eq!(response.result.status, "Failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(actions: &[ManagementAction]) -> BTreeSet<ManagementAction> {
        actions.iter().copied().collect()
    }

    /// Invariant 1 / E1: ∀ v ∈ {Default, ObserveCreateUpdate, ObserveDelete,
    /// Observe}: backward(forward(v)) = v.
    #[test]
    fn invariant_conversion_round_trip() {
        for policy in [
            ManagementPolicy::Default,
            ManagementPolicy::ObserveCreateUpdate,
            ManagementPolicy::ObserveDelete,
            ManagementPolicy::Observe,
        ] {
            let forwarded = forward(&policy);
            let back = backward(&forwarded, false);
            assert_eq!(back, policy, "round trip failed for {policy:?}");
        }
    }

    #[test]
    fn e1_legacy_to_hub_observe_create_update() {
        let forwarded = forward_str("ObserveCreateUpdate").unwrap();
        assert_eq!(
            forwarded,
            set(&[
                ManagementAction::Observe,
                ManagementAction::Create,
                ManagementAction::Update
            ])
        );
        let back = backward(&forwarded, false);
        assert_eq!(back.to_string(), "ObserveCreateUpdate");
    }

    #[test]
    fn e2_unknown_policy_fails() {
        let err = forward_str("unknown").unwrap_err();
        assert!(err.to_string().starts_with("unknown management policy"));
    }

    #[test]
    fn backward_all_maps_to_default() {
        let back = backward(&set(&[ManagementAction::All]), false);
        assert_eq!(back, ManagementPolicy::Default);
    }

    #[test]
    fn backward_superset_maps_to_default() {
        let back = backward(
            &set(&[
                ManagementAction::Observe,
                ManagementAction::Create,
                ManagementAction::Update,
                ManagementAction::Delete,
                ManagementAction::LateInitialize,
            ]),
            false,
        );
        assert_eq!(back, ManagementPolicy::Default);
    }

    #[test]
    fn backward_unsupported_combination_left_empty() {
        let back = backward(
            &set(&[ManagementAction::Create, ManagementAction::LateInitialize]),
            false,
        );
        assert_eq!(back, ManagementPolicy::Empty);
    }

    #[test]
    fn backward_unset_on_new_object_defaults() {
        let back = backward(&BTreeSet::new(), true);
        assert_eq!(back, ManagementPolicy::Default);
    }

    #[test]
    fn backward_unset_on_existing_object_left_empty() {
        let back = backward(&BTreeSet::new(), false);
        assert_eq!(back, ManagementPolicy::Empty);
    }
}
