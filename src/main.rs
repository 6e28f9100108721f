use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use graph_relay::{ConnectionManager, GraphService, RelayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---
    let config = RelayConfig::load().context("Failed to load configuration")?;

    init_subscriber(&config.log_level);

    tracing::info!(endpoint = %config.endpoint, "Starting graph-relay");

    let connection = ConnectionManager::websocket(&config);
    let app = graph_relay::http::router(GraphService::new(connection.clone()));

    let listener = TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;

    tracing::info!(addr = %config.http_addr, "HTTP server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutting down");
    connection.dispose().await;

    Ok(())
}

/// Stderr output; `RUST_LOG` wins over the configured level.
fn init_subscriber(level: &str) {
    // ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}
