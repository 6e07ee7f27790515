use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::instrument;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::AppState;
use crate::services::review::{CreateReviewRequest, ReviewService};

/// Reviews the other party of a completed job or rental.
///
/// POST /api/v1/reviews
///
/// # Returns
///
/// - `201 Created` with the review
/// - `400 Bad Request` - Rating outside 1-5, self review, or unfinished transaction
/// - `403 Forbidden` - Caller and reviewed user are not the two parties
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let review = ReviewService::create(&state.db_pool, user.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
