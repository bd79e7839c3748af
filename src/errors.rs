//! Typed error hierarchy for Deplik.
//!
//! Two enums cover the two directions traffic flows:
//! - `ProxyError` — talking to the upstream analysis backend
//! - `SubmitError` — the terminal client's view of a rejected run

use thiserror::Error;

/// Errors raised while reaching the upstream backend.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid backend URL '{url}': {message}")]
    InvalidBackendUrl { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Request body is not valid JSON: {0}")]
    InvalidBody(#[source] serde_json::Error),

    #[error("Backend unreachable at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid run id '{run_id}'")]
    InvalidRunId { run_id: String },

    #[error("No log stream for run {run_id}")]
    NoLogStream {
        run_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read backend response: {0}")]
    ResponseRead(#[source] reqwest::Error),
}

/// Errors surfaced by `deplik submit`.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Run rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Backend accepted the run but returned no run id")]
    MissingRunId,

    #[error(transparent)]
    Proxy(#[from] ProxyError),
}
