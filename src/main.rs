use std::future::ready;
use std::net::{Ipv4Addr, SocketAddr};

use axum::routing::get;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use yariga::{app, initialize_state, telemetry};

const DEFAULT_FILTER: &str = "yariga=info,tower_http=info";
/// Logs are also exported over OTLP when set.
const OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // initialize tracing, `RUST_LOG` first.
    let otlp = match std::env::var(OTLP_ENDPOINT) {
        Ok(endpoint) => Some(telemetry::setup_logging(&endpoint)?),
        Err(_) => None,
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(otlp)
        .init();

    let state = initialize_state().await?;
    let port = state.config.port();

    // initialize metrics.
    let handle = telemetry::setup_metrics_recorder()?;

    // `GET /metrics` is kept out of `track`.
    let app = app(state).route("/metrics", get(move || ready(handle.render())));

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
