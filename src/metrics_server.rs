// HTTP server for the Prometheus metrics endpoint
//
// Serves /metrics and /health on 0.0.0.0:<port>

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::metrics;

/// Build the metrics router
pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
}

/// Bind the metrics port and serve until the task is dropped
pub async fn start_metrics_server(port: u16) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?;

    info!("Metrics server listening on {}", addr);
    serve(listener).await
}

/// Serve the metrics router on an already bound listener
pub async fn serve(listener: TcpListener) -> Result<()> {
    axum::serve(listener, router())
        .await
        .context("Metrics server error")?;
    Ok(())
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}
