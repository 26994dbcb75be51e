//! CSA -> SSA field-manager upgrade (§4.5.1): detect managed-fields entries
//! left by this provider's historical client-side-apply writes, and migrate
//! the fields they own to the SSA field owner.

use std::str::FromStr;

use json_patch::{Patch, PatchOperation, ReplaceOperation, TestOperation};
use jsonptr::Pointer;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ManagedFieldsEntry;
use kube::api::DynamicObject;
use serde_json::Value;

use super::LEGACY_CSA_FIELD_MANAGERS;

/// Whether `entry` is an `Update` from a legacy CSA manager that "carries
/// real content" — any top-level key other than `f:status`, and an
/// `f:metadata` subtree (if present) containing keys other than
/// `f:finalizers` (§4.5.1).
fn carries_real_content(entry: &ManagedFieldsEntry) -> bool {
    let Some(manager) = entry.manager.as_deref() else {
        return false;
    };
    if !LEGACY_CSA_FIELD_MANAGERS.contains(&manager) {
        return false;
    }
    if entry.operation.as_deref() != Some("Update") {
        return false;
    }
    let Some(fields) = entry.fields_v1.as_ref() else {
        return false;
    };
    let Value::Object(top) = &fields.0 else {
        return false;
    };

    for (key, value) in top {
        if key == "f:status" {
            continue;
        }
        if key == "f:metadata" {
            if let Value::Object(meta) = value {
                if meta.keys().any(|k| k != "f:finalizers" && k != ".") {
                    return true;
                }
            }
            continue;
        }
        return true;
    }
    false
}

/// Whether `current`'s managed fields require the upgrade patch before an
/// SSA apply (§4.5, §4.5.1, E3).
pub fn needs_upgrade(current: &DynamicObject) -> bool {
    current
        .metadata
        .managed_fields
        .iter()
        .flatten()
        .any(carries_real_content)
}

/// Builds the JSON Patch transferring ownership of every legacy-manager
/// entry flagged by [`needs_upgrade`] to `ssa_owner`, leaving other managers
/// untouched, and asserting the current `resourceVersion` for optimistic
/// concurrency (§4.5.1). Applying this through a `Patch::Json` surfaces a
/// `Conflict` on `resourceVersion` mismatch, which callers must requeue
/// rather than retry with force.
pub fn upgrade_patch(current: &DynamicObject) -> Patch {
    let Some(resource_version) = current.metadata.resource_version.clone() else {
        return Patch(Vec::new());
    };

    let managed_fields: Vec<Value> = current
        .metadata
        .managed_fields
        .iter()
        .flatten()
        .map(|entry| {
            serde_json::to_value(transfer_if_legacy(entry))
                .expect("ManagedFieldsEntry always serializes")
        })
        .collect();

    Patch(vec![
        PatchOperation::Test(TestOperation {
            path: Pointer::from_str("/metadata/resourceVersion").expect("valid pointer"),
            value: Value::String(resource_version),
        }),
        PatchOperation::Replace(ReplaceOperation {
            path: Pointer::from_str("/metadata/managedFields").expect("valid pointer"),
            value: Value::Array(managed_fields),
        }),
    ])
}

fn transfer_if_legacy(entry: &ManagedFieldsEntry) -> ManagedFieldsEntry {
    if carries_real_content(entry) {
        ManagedFieldsEntry {
            manager: Some(super::ssa_owner_name(
                entry.manager.as_deref().unwrap_or_default(),
            )),
            operation: Some("Apply".to_string()),
            ..entry.clone()
        }
    } else {
        entry.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(manager: &str, operation: &str, fields: serde_json::Value) -> ManagedFieldsEntry {
        ManagedFieldsEntry {
            manager: Some(manager.to_string()),
            operation: Some(operation.to_string()),
            fields_v1: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::FieldsV1(fields)),
            ..Default::default()
        }
    }

    fn object_with(entries: Vec<ManagedFieldsEntry>) -> DynamicObject {
        let mut obj = DynamicObject::new(
            "example",
            &kube::api::ApiResource::from_gvk(&kube::core::GroupVersionKind::gvk(
                "", "v1", "ConfigMap",
            )),
        );
        obj.metadata.managed_fields = Some(entries);
        obj
    }

    /// E3: real spec content under a legacy manager triggers upgrade.
    #[test]
    fn e3_real_spec_content_triggers_upgrade() {
        let obj = object_with(vec![entry(
            "crossplane-kubernetes-provider",
            "Update",
            serde_json::json!({"f:spec": {"f:credentials": {}}}),
        )]);
        assert!(needs_upgrade(&obj));
    }

    /// E3: status-only content does not trigger upgrade.
    #[test]
    fn e3_status_only_does_not_trigger_upgrade() {
        let obj = object_with(vec![entry(
            "crossplane-kubernetes-provider",
            "Update",
            serde_json::json!({"f:status": {"f:conditions": {}}}),
        )]);
        assert!(!needs_upgrade(&obj));
    }

    /// E3: finalizers-only metadata content does not trigger upgrade.
    #[test]
    fn e3_finalizers_only_does_not_trigger_upgrade() {
        let obj = object_with(vec![entry(
            "crossplane-kubernetes-provider",
            "Update",
            serde_json::json!({"f:metadata": {"f:finalizers": {}}}),
        )]);
        assert!(!needs_upgrade(&obj));
    }

    #[test]
    fn non_legacy_manager_never_triggers_upgrade() {
        let obj = object_with(vec![entry(
            "some-other-controller",
            "Update",
            serde_json::json!({"f:spec": {}}),
        )]);
        assert!(!needs_upgrade(&obj));
    }

    /// Invariant 3: after upgrade, no managed-fields entry with
    /// operation=Update references a legacy-CSA manager for any path
    /// outside f:status or f:metadata.f:finalizers.
    #[test]
    fn invariant_upgrade_clears_legacy_update_entries() {
        let obj = object_with(vec![entry(
            "crossplane-kubernetes-provider",
            "Update",
            serde_json::json!({"f:spec": {"f:credentials": {}}}),
        )]);
        let patched = transfer_if_legacy(&obj.metadata.managed_fields.unwrap()[0]);
        assert_eq!(patched.operation.as_deref(), Some("Apply"));
        assert!(!LEGACY_CSA_FIELD_MANAGERS.contains(&patched.manager.unwrap().as_str()));
    }
}
