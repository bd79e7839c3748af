//! Client-side run flow: submit a repository, then follow its log stream.
//!
//! This is what the page does in the browser, driven from Rust so the
//! terminal client and the tests share one implementation.

use futures_util::StreamExt;

use crate::backend::BackendClient;
use crate::errors::{ProxyError, SubmitError};
use crate::session::{GENERIC_ERROR, RunSession};
use crate::sse::{SseDecoder, SseEvent};

/// Submit `session.repo_url`. On success the session holds the run id.
pub async fn submit(client: &BackendClient, session: &mut RunSession) -> Result<String, SubmitError> {
    session.begin();

    let (status, response) = match client.submit_run(&session.repo_url).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(error = %e, "run submission did not get an answer");
            session.unreachable();
            return Err(e.into());
        }
    };

    tracing::info!(status = status.as_u16(), "run submission answered");

    match session.accept_run(status.is_success(), response) {
        Some(run_id) => Ok(run_id),
        None if status.is_success() => Err(SubmitError::MissingRunId),
        None => Err(SubmitError::Rejected {
            status: status.as_u16(),
            message: session
                .error
                .clone()
                .unwrap_or_else(|| GENERIC_ERROR.to_string()),
        }),
    }
}

/// Follow the log stream for `run_id` until it ends or errors.
///
/// Every `message` event is appended to the session (re-deriving the
/// status) and then handed to `on_message`. The stream is never reopened.
pub async fn follow_logs<F>(
    client: &BackendClient,
    session: &mut RunSession,
    run_id: &str,
    mut on_message: F,
) -> Result<(), SubmitError>
where
    F: FnMut(&SseEvent, &RunSession),
{
    let response = match client.open_logs(run_id).await {
        Ok(response) => response,
        Err(e) => {
            session.stream_closed();
            return Err(e.into());
        }
    };

    let status = response.status();
    if !status.is_success() {
        session.stream_closed();
        return Err(SubmitError::Rejected {
            status: status.as_u16(),
            message: format!("log stream for run {} unavailable", run_id),
        });
    }

    let mut decoder = SseDecoder::new();
    let mut stream = response.bytes_stream();
    let mut outcome = Ok(());

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(run_id, error = %e, "log stream interrupted");
                outcome = Err(ProxyError::ResponseRead(e).into());
                break;
            }
        };

        for event in decoder.feed(&bytes) {
            if !event.is_message() {
                tracing::debug!(run_id, event = %event.event, "ignoring named event");
                continue;
            }
            tracing::trace!(run_id, event_id = ?event.id, bytes = event.data.len(), "log message");
            session.append_log(&event.data);
            on_message(&event, session);
        }
    }

    session.stream_closed();
    tracing::info!(run_id, status = %session.status, "log stream closed");
    outcome
}
