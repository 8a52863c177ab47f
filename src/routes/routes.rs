//! Routes of the side HTTP server.
//!
//! - `GET /metrics`: Prometheus scrape endpoint
//! - `GET /healthz`: liveness probe

use crate::{
    handlers::{health_handlers::healthz, metrics_handlers::metrics},
    services::metrics::Metrics,
};
use axum::{Router, routing::get};

/// Build the router; the caller attaches the `Metrics` state.
pub fn routes() -> Router<Metrics> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
}
