//! Proxy server command — `deplik serve`.

use anyhow::Result;
use deplik::config::DeplikConfig;

pub async fn cmd_serve(config: &DeplikConfig, open: bool) -> Result<()> {
    // No browser in dev mode; a separate front-end dev server is in use.
    if open && !config.server.dev_mode {
        let url = format!("http://localhost:{}", config.server.port);
        tokio::spawn(async move {
            // Small delay to let the server start binding
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                tracing::warn!(%url, error = %e, "failed to open browser");
            }
        });
    }

    deplik::web::server::start_server(config).await
}
