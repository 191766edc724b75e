//! # rowseal-api — Binary Entry Point
//!
//! Starts the admin HTTP server. See [`rowseal_api::bootstrap`] for the
//! environment it reads.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use rowseal_api::bootstrap::{bootstrap, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if settings.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;

    let state = bootstrap(&settings)
        .await
        .map_err(|e| {
            tracing::error!("bootstrap failed: {e}");
            e
        })?
        .with_metrics(handle);

    let app = rowseal_api::app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!("rowseal admin API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
