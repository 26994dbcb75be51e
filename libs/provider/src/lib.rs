pub mod api;
pub mod controller;
pub mod error;
pub mod finalizer;
pub mod informer;
pub mod manifest;
pub mod reference;
pub mod redact;
pub mod ssa_cache;
pub mod syncer;
pub mod telemetry;

pub use error::Error;
