//! Logging/tracing setup (§6 ambient stack). No metrics or distributed
//! tracing export is in scope (§1 Non-goals) — this only wires up
//! `tracing-subscriber` so reconciler spans get a `trace_id` field useful for
//! correlating log lines within a single process.

use serde::Serialize;
use tracing::dispatcher::SetGlobalDefaultError;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobalDefault(#[source] SetGlobalDefaultError),
}

/// A process-local correlation id for the current span, derived from its
/// address rather than a real distributed trace id — there is no exporter to
/// hand a `TraceId` to.
pub fn get_trace_id() -> String {
    format!("{:?}", tracing::Span::current().id())
}

/// Specifies the format of log output, either JSON or plain-text.
#[derive(clap::ValueEnum, Clone, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Initializes the global tracing subscriber. `log_filter` is an
/// `EnvFilter` directive string, e.g. `"info,kube=debug"`.
pub fn init(log_filter: &str, log_format: LogFormat) -> Result<(), Error> {
    let logger = match log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().compact().boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().compact().boxed(),
    };
    let filter = EnvFilter::new(log_filter);
    let collector = Registry::default().with(logger).with(filter);
    tracing::subscriber::set_global_default(collector).map_err(Error::SetGlobalDefault)
}
