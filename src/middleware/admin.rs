//! # Admin Key Middleware
//!
//! Guards the admin router with a shared key sent in the `X-Admin-Key` header.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use tracing::{debug, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::models::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Admin authentication middleware
///
/// The header value is compared to `ADMIN_API_KEY` ignoring ASCII case.
///
/// # Returns
///
/// - **Success**: Continues to next handler
/// - **Failure**: `503 Service Unavailable` when no key is configured,
///   `401 Unauthorized` when the header is missing or wrong
#[instrument(skip_all, fields(uri = %req.uri()))]
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    let Some(expected) = state.admin_api_key.as_ref() else {
        warn!("Admin request rejected, ADMIN_API_KEY is not configured");
        return Err(AppError::ServiceUnavailable("admin access is not configured"));
    };

    let provided = req
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key.eq_ignore_ascii_case(expected.expose_secret()) => {
            debug!("Admin key accepted");
            Ok(next.run(req).await)
        }
        Some(_) => {
            warn!("Invalid admin key");
            Err(AppError::Unauthorized("invalid admin key"))
        }
        None => Err(AppError::Unauthorized("admin key required")),
    }
}
