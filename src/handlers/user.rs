//! # User Handlers
//!
//! The caller's own account plus public profiles and reviews of other users.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::{AppState, ReviewResponse, UserPublicProfile, UserResponse};
use crate::services::review::ReviewService;
use crate::services::user::{InsuranceDocumentRequest, UpdateUserRequest, UserService};

/// GET /api/v1/users/me
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<UserResponse>> {
    let me = UserService::get_active(&state.db_pool, user.user_id).await?;
    debug!("Profile retrieved");
    Ok(Json(me.to_response()))
}

/// Updates the caller's profile.
///
/// PUT /api/v1/users/me
///
/// A changed address is geocoded again; geocoding failures keep the old location.
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let me = UserService::update(
        &state.db_pool,
        state.services.geocoder.as_ref(),
        user.user_id,
        payload,
    )
    .await?;
    Ok(Json(me.to_response()))
}

/// Records the URL of an uploaded insurance document for admin review.
///
/// POST /api/v1/users/me/insurance
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn upload_insurance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<InsuranceDocumentRequest>,
) -> AppResult<Json<UserResponse>> {
    let me = UserService::upload_insurance(&state.db_pool, user.user_id, payload).await?;
    Ok(Json(me.to_response()))
}

/// GET /api/v1/users/{id}/profile
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn get_public_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserPublicProfile>> {
    Ok(Json(
        UserService::public_profile(&state.db_pool, user_id).await?,
    ))
}

/// GET /api/v1/users/{id}/reviews
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn get_user_reviews(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<ReviewResponse>>> {
    Ok(Json(ReviewService::for_user(&state.db_pool, user_id).await?))
}
