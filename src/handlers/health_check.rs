//! # Health Check Handlers
//!
//! Liveness and readiness endpoints for load balancers and deployment tooling.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use tracing::{debug, instrument};

use crate::models::AppState;

/// Health check endpoint that returns 200 OK.
///
/// Performs no database checks; it only proves the process answers HTTP.
#[instrument]
pub async fn health_check() -> StatusCode {
    debug!("Health check endpoint accessed");
    StatusCode::OK
}

/// Readiness endpoint.
///
/// # Returns
///
/// - `200 OK` once startup has finished and migrations ran
/// - `503 Service Unavailable` before that
#[instrument(skip_all)]
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        debug!("Readiness probe before startup finished");
        StatusCode::SERVICE_UNAVAILABLE
    }
}
