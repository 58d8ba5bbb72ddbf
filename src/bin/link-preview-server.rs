use std::sync::Arc;

use tokio::net::TcpListener;

use link_preview::{setup_logging, HtmlParser, LinkPreviewConfig, LinkPreviewService, LogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging(LogConfig {
        log_level: std::env::var("LINK_PREVIEW_LOG").unwrap_or_else(|_| "info".to_string()),
        ..Default::default()
    })?;

    let config = LinkPreviewConfig::from_env()?;
    let addr = std::env::var("LINK_PREVIEW_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let service = Arc::new(LinkPreviewService::new(&config, HtmlParser::build, None)?);
    let app = link_preview::http::router(Arc::clone(&service));

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.release().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
    }
    tracing::info!("Shutdown signal received");
}
