//! # Insurance Gate
//!
//! Blocks completion routes for users whose insurance has not been verified by an
//! admin. Must run after [`auth_middleware`](super::auth_middleware).

use std::sync::Arc;

use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{instrument, warn};

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::AppState;

/// Insurance verification middleware
///
/// # Returns
///
/// - **Success**: Continues to next handler
/// - **Failure**: `403 Forbidden` when the user is unverified or inactive,
///   `401 Unauthorized` when the user no longer exists
#[instrument(skip_all, fields(user_id = %user.user_id))]
pub async fn insurance_middleware(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    let verified: Option<bool> = sqlx::query_scalar(
        "SELECT insurance_verified FROM users WHERE id = $1 AND is_active = TRUE",
    )
    .bind(user.user_id)
    .fetch_optional(&state.db_pool)
    .await?;

    match verified {
        Some(true) => Ok(next.run(req).await),
        Some(false) => {
            warn!("Insurance not verified");
            Err(AppError::Forbidden(
                "Insurance verification required for this action",
            ))
        }
        None => Err(AppError::Unauthorized("user not found or inactive")),
    }
}
