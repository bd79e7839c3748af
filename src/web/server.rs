use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    extract::Request,
    http::{StatusCode, header},
    response::{Html, IntoResponse},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState};
use super::embedded::Assets;
use crate::backend::BackendClient;
use crate::config::DeplikConfig;

/// Build the full application router with the proxy API and the page.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .fallback(static_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve embedded static files or fall back to index.html.
async fn static_handler(req: Request<Body>) -> impl IntoResponse {
    let path = req.uri().path().trim_start_matches('/');

    if !path.is_empty() {
        if let Some(content) = Assets::get(path) {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            return (
                [(header::CONTENT_TYPE, mime.as_ref().to_string())],
                content.data.into_owned(),
            )
                .into_response();
        }
    }

    match Assets::get("index.html") {
        Some(content) => Html(String::from_utf8_lossy(&content.data).to_string()).into_response(),
        None => (StatusCode::NOT_FOUND, "Page not found: ui/index.html was not embedded.")
            .into_response(),
    }
}

/// Start the proxy server and block until Ctrl+C.
pub async fn start_server(config: &DeplikConfig) -> Result<()> {
    let backend =
        BackendClient::new(&config.backend).context("Failed to configure backend client")?;
    let state = Arc::new(AppState { backend });

    let mut app = build_router(state);

    if config.server.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        backend = %config.backend.url,
        dev_mode = config.server.dev_mode,
        "server listening"
    );
    println!("Deplik running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
