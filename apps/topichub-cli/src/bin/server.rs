use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use topichub_core::config::Settings;
use topichub_http::router;

const PURGE_EVERY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    topichub_cli::init_tracing();
    let settings = Settings::load().map_err(|e| {
        eprintln!("Error loading settings: {e}");
        e
    })?;
    let addr = settings.server.bind_addr();
    let service = Arc::new(topichub_cli::build_service(settings));

    let purger = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PURGE_EVERY);
            loop {
                ticker.tick().await;
                if let Err(e) = service.purge_expired().await {
                    tracing::warn!(error = %e, "session purge failed");
                }
            }
        })
    };

    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "topichub server listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl-c handler failed");
            }
        })
        .await?;

    purger.abort();
    tracing::info!("topichub server stopped");
    Ok(())
}
