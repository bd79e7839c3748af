//! Terminal client command — `deplik submit`.

use anyhow::{Context, Result};
use deplik::backend::{BackendClient, PROXY_PREFIX};
use deplik::config::{BackendSection, DeplikConfig};
use deplik::errors::SubmitError;
use deplik::runner;
use deplik::session::RunSession;
use deplik::ui::RunView;

/// Submit `repo_url` and follow its logs. Goes straight to the backend
/// unless `server` names a Deplik server to go through.
pub async fn cmd_submit(config: &DeplikConfig, repo_url: &str, server: Option<&str>) -> Result<()> {
    let client = match server {
        Some(url) => {
            let settings = BackendSection {
                url: url.to_string(),
                ..config.backend.clone()
            };
            BackendClient::with_prefix(&settings, PROXY_PREFIX)
        }
        None => BackendClient::new(&config.backend),
    }
    .context("Failed to configure client")?;

    let mut session = RunSession::new(repo_url.trim());
    if !session.can_submit() {
        anyhow::bail!("Repository URL must not be empty");
    }

    let view = RunView::new(&session.repo_url);

    let run_id = match runner::submit(&client, &mut session).await {
        Ok(run_id) => run_id,
        Err(e) => {
            view.fail(session.error.as_deref().unwrap_or("Something went wrong"));
            return Err(e).context("Run submission failed");
        }
    };
    view.run_accepted(&run_id, &session);

    let followed = runner::follow_logs(&client, &mut session, &run_id, |event, session| {
        view.log_message(&event.data, session);
    })
    .await;

    match followed {
        Ok(()) => {
            view.finish(&session);
            Ok(())
        }
        // Same as the page: a stream error closes the stream and the run
        // keeps whatever status the logs so far produced.
        Err(SubmitError::Proxy(e)) => {
            tracing::warn!(run_id = %run_id, error = %e, "log stream ended with an error");
            view.finish(&session);
            Ok(())
        }
        Err(e) => {
            view.fail(&e.to_string());
            Err(e).context("Failed to follow run logs")
        }
    }
}
