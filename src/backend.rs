//! HTTP client for the analysis backend.
//!
//! The backend exposes `POST /run` and `GET /logs/{id}`. A Deplik server
//! exposes the same two routes under `/api`, so the client takes a route
//! prefix and can talk to either.

use std::time::Duration;

use axum::body::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};

use crate::config::BackendSection;
use crate::errors::ProxyError;
use crate::session::{RunRequest, RunResponse};

pub const EVENT_STREAM: &str = "text/event-stream";
pub const APPLICATION_JSON: &str = "application/json";

/// Route prefix of a Deplik server's proxy endpoints.
pub const PROXY_PREFIX: &str = "/api";

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base: Url,
    prefix: String,
    request_timeout: Duration,
}

impl BackendClient {
    /// Client for the backend itself (`/run`, `/logs/{id}`).
    pub fn new(settings: &BackendSection) -> Result<Self, ProxyError> {
        Self::with_prefix(settings, "")
    }

    /// Client for routes mounted under `prefix`, e.g. a Deplik server's `/api`.
    pub fn with_prefix(settings: &BackendSection, prefix: &str) -> Result<Self, ProxyError> {
        let base = Url::parse(settings.url.trim()).map_err(|e| ProxyError::InvalidBackendUrl {
            url: settings.url.clone(),
            message: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ProxyError::InvalidBackendUrl {
                url: settings.url.clone(),
                message: "URL cannot be used as a base".to_string(),
            });
        }

        // No total timeout here: log streams stay open for the whole build.
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout())
            .build()
            .map_err(ProxyError::ClientBuild)?;

        Ok(Self {
            http,
            base,
            prefix: prefix.trim_end_matches('/').to_string(),
            request_timeout: settings.request_timeout(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for part in self.prefix.split('/').filter(|p| !p.is_empty()) {
                path.push(part);
            }
            path.extend(segments);
        }
        url
    }

    pub fn run_url(&self) -> Url {
        self.endpoint(&["run"])
    }

    /// The run id is percent-encoded as one path segment. Empty and
    /// dot-segment ids are refused; URL normalization would drop them and
    /// land on `/logs` itself.
    pub fn logs_url(&self, run_id: &str) -> Result<Url, ProxyError> {
        if matches!(run_id, "" | "." | "..") {
            return Err(ProxyError::InvalidRunId {
                run_id: run_id.to_string(),
            });
        }
        Ok(self.endpoint(&["logs", run_id]))
    }

    /// POST `body` to `/run` as-is.
    pub async fn forward_run(&self, body: Bytes) -> Result<reqwest::Response, ProxyError> {
        let url = self.run_url();
        tracing::debug!(%url, bytes = body.len(), "forwarding run submission");

        self.http
            .post(url.clone())
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .timeout(self.request_timeout)
            .body(body)
            .send()
            .await
            .map_err(|source| ProxyError::Unreachable {
                url: url.to_string(),
                source,
            })
    }

    /// Open the log stream for `run_id`. The response body is left unread.
    pub async fn open_logs(&self, run_id: &str) -> Result<reqwest::Response, ProxyError> {
        let url = self.logs_url(run_id)?;
        tracing::debug!(%url, run_id, "opening log stream");

        self.http
            .get(url)
            .header(ACCEPT, EVENT_STREAM)
            .send()
            .await
            .map_err(|source| ProxyError::NoLogStream {
                run_id: run_id.to_string(),
                source,
            })
    }

    /// Submit `repo_url` and decode the answer.
    ///
    /// A body that is not a `RunResponse` is folded into `error` so callers
    /// see one shape regardless of what the backend sent.
    pub async fn submit_run(&self, repo_url: &str) -> Result<(StatusCode, RunResponse), ProxyError> {
        let request = RunRequest {
            repo_url: repo_url.to_string(),
        };
        let body = serde_json::to_vec(&request).map_err(ProxyError::InvalidBody)?;

        let response = self.forward_run(Bytes::from(body)).await?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(ProxyError::ResponseRead)?;

        let run = match serde_json::from_slice::<RunResponse>(&bytes) {
            Ok(run) => run,
            Err(_) => {
                let text = String::from_utf8_lossy(&bytes).trim().to_string();
                RunResponse {
                    error: (!text.is_empty()).then_some(text),
                    ..Default::default()
                }
            }
        };

        Ok((status, run))
    }
}
