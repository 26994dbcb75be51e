//! Error kinds per §7. Every variant maps to one of the five kinds spec.md
//! names: Config, Parse, RemoteTransient, Conflict, NotReady. The rest
//! (`Kube`, `Client`) are the ambient "everything else is wrapped and
//! retried" case.

use crate::redact::redact_pointers;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// Fatal for the current reconcile: the embedded manifest did not decode,
    /// or lacked `kind`/`apiVersion` (§4.2).
    #[error("failed to unmarshal embedded manifest: {0}")]
    UnmarshalTemplate(String),

    /// The legacy v1alpha1 `ManagementPolicy` enum value is not one this
    /// provider understands (§4.9).
    #[error("unknown management policy: {0}")]
    UnknownManagementPolicy(String),

    /// `ManagementActions` was the empty set (§3 invariant).
    #[error("managementActions must not be empty")]
    EmptyManagementActions,

    /// A `ProviderConfig` (or `ClusterProviderConfig`) could not be found or
    /// its credentials source was invalid. Permanent configuration errors are
    /// not retried; transient credential-fetch failures are (§7).
    #[error("provider config error: {0}")]
    Config(String),

    /// A reference could not yet be resolved: the target doesn't exist, or a
    /// `PatchesFrom` field path doesn't resolve to a concrete value (§4.3).
    /// Not a controller error — surfaced as Ready=False and requeued.
    #[error("reference not ready: {0}")]
    ReferenceNotReady(String),

    /// The field-manager upgrade patch hit an optimistic-concurrency
    /// conflict (§4.5.1, §7). Requeue; never overridden with force.
    #[error("conflict applying field-manager upgrade patch: {0}")]
    Conflict(String),

    /// A transient error talking to a remote cluster: network errors, 5xx,
    /// non-upgrade conflicts (§7).
    #[error("transient remote error: {0}")]
    RemoteTransient(#[source] kube::Error),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Client(#[from] provider_kubernetes_client::Error),

    #[error("{0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// A short, stable label for metrics/log correlation, independent of the
    /// (potentially pointer-bearing) display string.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::UnmarshalTemplate(_) => "UnmarshalTemplate",
            Error::UnknownManagementPolicy(_) => "UnknownManagementPolicy",
            Error::EmptyManagementActions => "EmptyManagementActions",
            Error::Config(_) => "Config",
            Error::ReferenceNotReady(_) => "ReferenceNotReady",
            Error::Conflict(_) => "Conflict",
            Error::RemoteTransient(_) => "RemoteTransient",
            Error::Kube(_) => "Kube",
            Error::Client(_) => "Client",
            Error::Serialization(_) => "Serialization",
        }
    }

    /// Whether this reconcile should requeue with a non-error, non-retried
    /// "not ready yet" signal rather than being surfaced as a failure.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Error::ReferenceNotReady(_))
    }

    /// True for kinds spec.md §7 marks fatal-for-this-reconcile rather than
    /// retriable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnmarshalTemplate(_)
                | Error::UnknownManagementPolicy(_)
                | Error::EmptyManagementActions
                | Error::Config(_)
        )
    }

    /// User-visible message with pointer literals redacted (§6, §7, E5).
    pub fn redacted_message(&self) -> String {
        redact_pointers(&self.to_string())
    }
}
