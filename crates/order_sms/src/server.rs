// Rust guideline compliant 2026-10-16

//! Liveness route. Answers independently of the listener's health.

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;

/// Body of `GET /`.
pub const LIVENESS_BODY: &str = "Order SMS server (Hubtel) running...";

/// Router exposing `GET /`.
#[must_use]
pub fn router() -> Router {
    Router::new().route("/", get(|| async { LIVENESS_BODY }))
}

/// Serve [`router`] on `listener` until the process stops.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "server.listening");
    }
    axum::serve(listener, router()).await
}
