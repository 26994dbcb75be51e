//! Types shared across Object API versions and the Collection/ProviderConfig
//! CRDs (§3).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which of {All, Observe, Create, Update, Delete, LateInitialize} the
/// controller may perform against the remote resource (§3, §4.6, §4.9).
/// `All` is kept as a distinct wire value (rather than expanded at parse
/// time) so the backward conversion in §4.9 can match on its literal
/// presence; use [`expand`] wherever the reconciler needs to test "does the
/// policy allow action X".
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ManagementAction {
    All,
    Observe,
    Create,
    Update,
    Delete,
    LateInitialize,
}

pub type ManagementActions = BTreeSet<ManagementAction>;

/// Every concrete action other than the `All` umbrella.
pub const CONCRETE_ACTIONS: [ManagementAction; 5] = [
    ManagementAction::Observe,
    ManagementAction::Create,
    ManagementAction::Update,
    ManagementAction::Delete,
    ManagementAction::LateInitialize,
];

/// Expands the `All` umbrella (if present) into its constituent concrete
/// actions, so membership tests (`policy allows Create?`) don't need to
/// special-case it at every call site (§4.6, invariant "management policy
/// enforcement").
pub fn expand(policies: &ManagementActions) -> ManagementActions {
    if policies.contains(&ManagementAction::All) {
        CONCRETE_ACTIONS.into_iter().collect()
    } else {
        policies.clone()
    }
}

pub fn allows(policies: &ManagementActions, action: ManagementAction) -> bool {
    policies.contains(&ManagementAction::All) || policies.contains(&action)
}

/// Readiness policy (§3, §4.6).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ReadinessPolicy {
    #[default]
    SuccessfulCreate,
    DeriveFromObject,
    AllTrue,
}

/// What happens to the remote resource when the Object is deleted (§3, §4.6).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DeletionPolicy {
    #[default]
    Delete,
    Orphan,
}

/// A GVK + namespaced-name coordinate for a remote or control-plane object
/// this Object depends on (§3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct DependsOn {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A `PatchesFrom` reference: a [`DependsOn`] plus the source field path to
/// read and, optionally, a different field path to write it to (§3, §4.3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatchesFrom {
    #[serde(flatten)]
    pub depends_on: DependsOn,
    pub field_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_field_path: Option<String>,
}

impl PatchesFrom {
    /// Default `ToFieldPath` = source `FieldPath` (§3).
    pub fn to_field_path(&self) -> &str {
        self.to_field_path.as_deref().unwrap_or(&self.field_path)
    }
}

/// Either a [`DependsOn`] (GC/indexing only) or a [`PatchesFrom`] (also
/// patches a value into the desired manifest) (§3, §4.3).
///
/// Modeled as an untagged enum: both variants share the `dependsOn`-shaped
/// fields flattened in, and the presence of `fieldPath` decides which one a
/// given document parses as. `PatchesFrom` is listed first so serde tries
/// the more specific (more fields) variant before falling back.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum Reference {
    PatchesFrom(PatchesFrom),
    DependsOn(DependsOn),
}

impl Reference {
    pub fn depends_on(&self) -> &DependsOn {
        match self {
            Reference::PatchesFrom(p) => &p.depends_on,
            Reference::DependsOn(d) => d,
        }
    }
}

/// One entry of `spec.connectionDetails`: a remote object to read a key from,
/// and where to publish it (§3, §4.6).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetail {
    #[serde(flatten)]
    pub object_reference: DependsOn,
    pub from_connection_secret_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_connection_secret_key: Option<String>,
}

impl ConnectionDetail {
    /// Defaults to the referenced key (§4.6).
    pub fn to_connection_secret_key(&self) -> &str {
        self.to_connection_secret_key
            .as_deref()
            .unwrap_or(&self.from_connection_secret_key)
    }
}

/// The embedded desired manifest (§3, §4.2).
///
/// Mirrors the upstream Go `runtime.RawExtension` idiom: on the wire this
/// field *is* the embedded manifest object, not a wrapper around it — the
/// custom (de)serialization below inlines/extracts the raw JSON bytes
/// instead of nesting them under a `raw` key, so round-tripping a `Manifest`
/// through YAML looks exactly like round-tripping the manifest itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Manifest {
    pub raw: Vec<u8>,
}

impl Serialize for Manifest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if self.raw.is_empty() {
            return serializer.serialize_none();
        }
        let value: serde_json::Value =
            serde_json::from_slice(&self.raw).map_err(serde::ser::Error::custom)?;
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Manifest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let raw = serde_json::to_vec(&value).map_err(serde::de::Error::custom)?;
        Ok(Manifest { raw })
    }
}

impl JsonSchema for Manifest {
    fn schema_name() -> String {
        "Manifest".to_owned()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        // Preserve-unknown-fields object, matching `x-kubernetes-preserve-unknown-fields`.
        serde_json::Value::json_schema(gen)
    }
}
