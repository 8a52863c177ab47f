//! Prometheus scrape endpoint.
//!
//! - GET /metrics -> text exposition of the recorder counters

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use prometheus::TEXT_FORMAT;

use crate::{errors::AppError, services::metrics::Metrics};

/// `GET /metrics`
pub async fn metrics(State(metrics): State<Metrics>) -> Result<Response, AppError> {
    let body = metrics.export().map_err(|err| {
        tracing::error!(error = %err, "unable to encode metrics");
        AppError::from(err)
    })?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response())
}
