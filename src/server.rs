//! HTTP landing endpoint for deployments that invoke the sweeper over HTTP.
//!
//! The sweep itself is never triggered from here; the endpoint only answers
//! so that stray requests are handled gracefully.

use axum::{Json, Router, response::IntoResponse, routing::get};
use http::StatusCode;
use serde::Serialize;

/// Body returned by `GET /`.
pub const INDEX_BODY: &str = "Nothing to see here. You can go about your business. Move along.";

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
}

async fn index() -> impl IntoResponse {
    (StatusCode::OK, INDEX_BODY)
}

#[tracing::instrument(name = "health.check")]
async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Serve [`router`] on `config.host:config.port` until Ctrl+C or SIGTERM.
#[cfg(feature = "server")]
pub async fn serve(config: &crate::config::ServerConfig) -> std::io::Result<()> {
    let addr = std::net::SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Listening");

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(feature = "server")]
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
