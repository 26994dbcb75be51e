//! Cloud-specific credential exchange. Each submodule turns a
//! [`crate::provider_config::IdentitySpec`] variant into a `kube::Config`
//! the [`crate::factory`] can build a client from.

pub mod aws;
pub mod azure;
pub mod gardener;
pub mod gcp;
