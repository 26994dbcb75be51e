//! Per-cluster client construction and caching for the provider (§4.1).
//!
//! This crate is the "external collaborator" boundary between the
//! reconciler core (`provider-kubernetes`) and the Kubernetes client
//! configuration machinery: it knows how to turn a `ProviderConfig`'s
//! credentials source and optional cloud identity into a [`kube::Client`],
//! and how to cache the result.

pub mod cache;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod identity;

pub use cache::{CacheKey, ConnectionCache};
pub use credentials::{CredentialsSource, IdentitySpec};
pub use error::{Error, Result};
