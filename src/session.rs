//! Client-side state for one sandbox run.
//!
//! `RunSession` is what the page (and `deplik submit`) keeps while a run is
//! in flight: the repository being checked, the run id handed back by the
//! backend, the log text received so far and the coarse status derived from
//! it. Nothing here is persisted.

use serde::{Deserialize, Serialize};

pub const SUMMARY_PLACEHOLDER: &str =
    "The AI summary will appear here once the analysis is complete.";
pub const SUGGESTIONS_PLACEHOLDER: &str = "Suggestions will appear once analysis completes";
pub const LOGS_PLACEHOLDER: &str = "Waiting for logs...";
pub const GENERIC_ERROR: &str = "Something went wrong";
pub const UNREACHABLE_ERROR: &str = "Failed to reach backend";

/// Marker the backend prints once the image built successfully.
const BUILD_FINISHED_MARKER: &str = "Docker build finished";
const FAILURE_MARKERS: &[&str] = &["error", "Error", "failed"];

/// Coarse readiness label shown next to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    #[default]
    Running,
    Ready,
    NotReady,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Ready => write!(f, "READY"),
            RunStatus::NotReady => write!(f, "NOT_READY"),
        }
    }
}

/// Derive the status from the accumulated log text.
///
/// The failure check runs first and the build-finished check second, so a
/// log containing both ends up `Ready`.
pub fn derive_status(logs: &str) -> RunStatus {
    let mut status = RunStatus::Running;

    if FAILURE_MARKERS.iter().any(|marker| logs.contains(marker)) {
        status = RunStatus::NotReady;
    }

    if logs.contains(BUILD_FINISHED_MARKER) {
        status = RunStatus::Ready;
    }

    status
}

/// AI summary attached to a run, when the backend supplies one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Body returned by the backend's `/run` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

/// Body sent to `/run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub repo_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunSession {
    pub repo_url: String,
    pub run_id: Option<String>,
    pub logs: String,
    pub error: Option<String>,
    pub analysis: Option<Analysis>,
    pub status: RunStatus,
    pub loading: bool,
}

impl RunSession {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Self::default()
        }
    }

    /// The submit button is enabled only when idle with a URL entered.
    pub fn can_submit(&self) -> bool {
        !self.loading && !self.repo_url.is_empty()
    }

    /// Reset for a new submission. Status and analysis carry over until the
    /// next log update or response replaces them.
    pub fn begin(&mut self) {
        self.loading = true;
        self.error = None;
        self.logs.clear();
        self.run_id = None;
    }

    /// Record the backend's answer to a submission. Returns the run id when
    /// the run was accepted and a log stream should be opened.
    pub fn accept_run(&mut self, ok: bool, response: RunResponse) -> Option<String> {
        if !ok {
            self.fail(response.error.unwrap_or_else(|| GENERIC_ERROR.to_string()));
            return None;
        }

        let Some(run_id) = response.run_id else {
            self.fail(
                response
                    .error
                    .unwrap_or_else(|| GENERIC_ERROR.to_string()),
            );
            return None;
        };

        if let Some(analysis) = response.analysis {
            self.analysis = Some(analysis);
        }
        self.run_id = Some(run_id.clone());
        Some(run_id)
    }

    /// The submission never got an HTTP answer.
    pub fn unreachable(&mut self) {
        self.fail(UNREACHABLE_ERROR.to_string());
    }

    fn fail(&mut self, message: String) {
        self.error = Some(message);
        self.loading = false;
    }

    /// Append one log message and re-derive the status.
    pub fn append_log(&mut self, chunk: &str) {
        self.logs.push_str(chunk);
        if !self.logs.is_empty() {
            self.status = derive_status(&self.logs);
        }
    }

    /// The event source errored or ended; it is closed, not retried.
    pub fn stream_closed(&mut self) {
        self.loading = false;
    }

    pub fn summary_text(&self) -> &str {
        match &self.analysis {
            Some(a) if !a.summary.is_empty() => &a.summary,
            _ => SUMMARY_PLACEHOLDER,
        }
    }

    pub fn logs_text(&self) -> &str {
        if self.logs.is_empty() {
            LOGS_PLACEHOLDER
        } else {
            &self.logs
        }
    }
}
