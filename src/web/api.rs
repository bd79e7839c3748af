use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::backend::{APPLICATION_JSON, BackendClient, EVENT_STREAM};
use crate::errors::ProxyError;
use crate::session::UNREACHABLE_ERROR;

pub const NO_LOG_STREAM: &str = "No log stream";

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub backend: BackendClient,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::InvalidBody(e) => ApiError::BadRequest(format!("Invalid JSON body: {}", e)),
            ProxyError::Unreachable { .. } | ProxyError::ResponseRead(_) => {
                ApiError::BadGateway(UNREACHABLE_ERROR.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/run", post(submit_run))
        .route("/api/logs/{id}", get(stream_logs))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

/// Relay a run submission. The body must be JSON but is forwarded
/// byte-for-byte; the upstream status and body come back untouched.
async fn submit_run(State(state): State<SharedState>, body: Bytes) -> Result<Response, ApiError> {
    serde_json::from_slice::<serde::de::IgnoredAny>(&body).map_err(ProxyError::InvalidBody)?;

    let upstream = state.backend.forward_run(body).await.inspect_err(|e| {
        tracing::warn!(error = %e, "run submission failed");
    })?;

    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(APPLICATION_JSON));
    let bytes = upstream
        .bytes()
        .await
        .map_err(ProxyError::ResponseRead)
        .inspect_err(|e| tracing::warn!(error = %e, "run response unreadable"))?;

    tracing::info!(status = status.as_u16(), bytes = bytes.len(), "run submission relayed");

    Ok((status, [(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Pipe the upstream event stream through without buffering.
async fn stream_logs(State(state): State<SharedState>, Path(run_id): Path<String>) -> Response {
    let upstream = match state.backend.open_logs(&run_id).await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::warn!(run_id = %run_id, error = %e, "log stream unavailable");
            return (StatusCode::INTERNAL_SERVER_ERROR, NO_LOG_STREAM).into_response();
        }
    };

    let status = upstream.status();
    tracing::info!(run_id = %run_id, status = status.as_u16(), "log stream opened");

    (
        status,
        [
            (header::CONTENT_TYPE, EVENT_STREAM),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::BackendSection;
    use axum::http::{HeaderMap, Request};
    use http_body_util::BodyExt;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    /// Serve `router` on an ephemeral port and return its base URL.
    pub(crate) async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// A URL on which nothing listens.
    pub(crate) async fn dead_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    pub(crate) fn test_state(backend_url: &str) -> SharedState {
        let settings = BackendSection {
            url: backend_url.to_string(),
            connect_timeout_secs: 2,
            request_timeout_secs: 5,
        };
        Arc::new(AppState {
            backend: BackendClient::new(&settings).unwrap(),
        })
    }

    fn test_app(backend_url: &str) -> Router {
        api_router().with_state(test_state(backend_url))
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[derive(Default)]
    struct Captured {
        body: Option<Bytes>,
        headers: Option<HeaderMap>,
    }

    fn recording_upstream(
        captured: Arc<Mutex<Captured>>,
        status: StatusCode,
        content_type: &'static str,
        reply: &'static str,
    ) -> Router {
        Router::new().route(
            "/run",
            post(move |headers: HeaderMap, body: Bytes| {
                let captured = captured.clone();
                async move {
                    let mut c = captured.lock().unwrap();
                    c.body = Some(body);
                    c.headers = Some(headers);
                    (status, [(header::CONTENT_TYPE, content_type)], reply)
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app("http://127.0.0.1:9");
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_run_forwards_body_verbatim_and_relays_status() {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let upstream = recording_upstream(
            captured.clone(),
            StatusCode::CREATED,
            "application/json",
            r#"{"runId":"r-42"}"#,
        );
        let app = test_app(&spawn_upstream(upstream).await);

        // Odd spacing and key order must survive the trip.
        let sent = r#"{ "repoUrl":"https://github.com/u/r",  "extra": [1, 2.50] }"#;
        let request = Request::builder()
            .method("POST")
            .uri("/api/run")
            .header("content-type", "application/json")
            .body(Body::from(sent))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(json["runId"], "r-42");

        let c = captured.lock().unwrap();
        assert_eq!(c.body.as_deref(), Some(sent.as_bytes()));
        assert_eq!(
            c.headers.as_ref().unwrap()[header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_run_relays_upstream_error_status_and_text_body() {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let upstream = recording_upstream(
            captured,
            StatusCode::UNPROCESSABLE_ENTITY,
            "text/plain; charset=utf-8",
            "repository not found",
        );
        let app = test_app(&spawn_upstream(upstream).await);

        let request = Request::builder()
            .method("POST")
            .uri("/api/run")
            .body(Body::from(r#"{"repoUrl":"https://github.com/nope/nope"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"repository not found");
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_json_without_forwarding() {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let upstream = recording_upstream(captured.clone(), StatusCode::OK, "application/json", "{}");
        let app = test_app(&spawn_upstream(upstream).await);

        let request = Request::builder()
            .method("POST")
            .uri("/api/run")
            .body(Body::from("repoUrl=https://github.com/u/r"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert!(json["error"].as_str().unwrap().contains("Invalid JSON"));
        assert!(captured.lock().unwrap().body.is_none());
    }

    #[tokio::test]
    async fn test_run_backend_unreachable_is_bad_gateway() {
        let app = test_app(&dead_url().await);
        let request = Request::builder()
            .method("POST")
            .uri("/api/run")
            .body(Body::from(r#"{"repoUrl":"x"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json: serde_json::Value = body_json(response.into_body()).await;
        assert_eq!(json["error"], UNREACHABLE_ERROR);
    }

    #[tokio::test]
    async fn test_logs_relay_bytes_unchanged_with_sse_headers() {
        let seen: Arc<Mutex<Option<(String, HeaderMap)>>> = Arc::new(Mutex::new(None));
        let seen_upstream = seen.clone();
        // Deliberately not normalized: comments, CRLF, a trailing partial event.
        let raw: &'static str = "data: Cloning\n\n: ping\r\ndata: Step 1/4\r\n\r\nevent: x\ndata: tail";
        let upstream = Router::new().route(
            "/logs/{id}",
            get(move |Path(id): Path<String>, headers: HeaderMap| {
                let seen = seen_upstream.clone();
                async move {
                    *seen.lock().unwrap() = Some((id, headers));
                    ([(header::CONTENT_TYPE, "text/event-stream")], raw)
                }
            }),
        );
        let app = test_app(&spawn_upstream(upstream).await);

        let request = Request::builder()
            .uri("/api/logs/run-7")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], raw.as_bytes());

        let (id, upstream_headers) = seen.lock().unwrap().take().unwrap();
        assert_eq!(id, "run-7");
        assert_eq!(upstream_headers[header::ACCEPT], "text/event-stream");
    }

    #[tokio::test]
    async fn test_logs_are_streamed_before_upstream_finishes() {
        let (tx, rx) = mpsc::channel::<Bytes>(4);
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));
        let upstream = Router::new().route(
            "/logs/{id}",
            get(move || {
                let rx = rx.clone();
                async move {
                    let rx = rx.lock().await.take().unwrap();
                    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                        rx.recv().await.map(|b| (Ok::<_, Infallible>(b), rx))
                    });
                    Body::from_stream(stream)
                }
            }),
        );
        let app = test_app(&spawn_upstream(upstream).await);

        let request = Request::builder()
            .uri("/api/logs/live")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let mut body = response.into_body();

        let first = b"data: first\n\n";
        tx.send(Bytes::from_static(first)).await.unwrap();

        let mut received = Vec::new();
        while received.len() < first.len() {
            let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
                .await
                .expect("first chunk should arrive while the upstream is still open")
                .unwrap()
                .unwrap();
            if let Ok(data) = frame.into_data() {
                received.extend_from_slice(&data);
            }
        }
        assert_eq!(received, first);

        tx.send(Bytes::from_static(b"data: second\n\n")).await.unwrap();
        drop(tx);
        let rest = body.collect().await.unwrap().to_bytes();
        assert_eq!(&rest[..], b"data: second\n\n");
    }

    #[tokio::test]
    async fn test_logs_backend_unreachable_is_fixed_500() {
        let app = test_app(&dead_url().await);
        let request = Request::builder()
            .uri("/api/logs/abc")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], NO_LOG_STREAM.as_bytes());
    }

    #[tokio::test]
    async fn test_logs_dot_segment_ids_never_reach_other_routes() {
        let hits = Arc::new(Mutex::new(Vec::<String>::new()));
        let list_hits = hits.clone();
        let run_hits = hits.clone();
        let upstream = Router::new()
            .route(
                "/logs",
                get(move || {
                    let hits = list_hits.clone();
                    async move {
                        hits.lock().unwrap().push("/logs".to_string());
                        "all logs"
                    }
                }),
            )
            .route(
                "/logs/{id}",
                get(move |Path(id): Path<String>| {
                    let hits = run_hits.clone();
                    async move {
                        hits.lock().unwrap().push(format!("/logs/{}", id));
                        "data: x\n\n"
                    }
                }),
            );
        let url = spawn_upstream(upstream).await;

        for encoded in ["%2E%2E", "%2E", "%2e%2e"] {
            let request = Request::builder()
                .uri(format!("/api/logs/{}", encoded))
                .body(Body::empty())
                .unwrap();
            let response = test_app(&url).oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body = response.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(&body[..], NO_LOG_STREAM.as_bytes());
        }

        assert!(hits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_logs_relay_upstream_status() {
        let upstream = Router::new().route(
            "/logs/{id}",
            get(|| async { (StatusCode::NOT_FOUND, "unknown run") }),
        );
        let app = test_app(&spawn_upstream(upstream).await);
        let request = Request::builder()
            .uri("/api/logs/missing")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_proxy_error_mapping() {
        let serde_err = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        assert!(matches!(
            ApiError::from(ProxyError::InvalidBody(serde_err)),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(ProxyError::InvalidBackendUrl {
                url: "x".into(),
                message: "y".into()
            }),
            ApiError::Internal(_)
        ));
    }
}
