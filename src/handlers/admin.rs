//! # Admin Handlers
//!
//! Moderation endpoints. Every route here sits behind
//! [`admin_middleware`](crate::middleware::admin_middleware).

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{AppState, PaginatedResponse, UserResponse};
use crate::services::admin::{AdminService, AdminStats, AdminUserFilters};

/// Platform counters.
///
/// GET /api/v1/admin/stats
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> AppResult<Json<AdminStats>> {
    Ok(Json(AdminService::stats(&state.db_pool).await?))
}

/// Gets a paginated list of users, newest first.
///
/// GET /api/v1/admin/users ?is_active&insurance_verified&zip_code&school_district&page&limit
///
/// # Returns
///
/// - `200 OK` with `PaginatedResponse<UserResponse>`
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<AdminUserFilters>,
) -> AppResult<Json<PaginatedResponse<UserResponse>>> {
    Ok(Json(AdminService::users(&state.db_pool, filters).await?))
}

/// Deactivates a user and revokes all of their refresh tokens.
///
/// PUT /api/v1/admin/users/{id}/deactivate
#[instrument(skip_all, fields(%user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    AdminService::set_active(&state.db_pool, user_id, false).await?;
    state.jwt_service.revoke_user_refresh_tokens(user_id).await?;
    info!("User deactivated");
    Ok(Json(json!({ "message": "user deactivated successfully" })))
}

/// PUT /api/v1/admin/users/{id}/activate
#[instrument(skip_all, fields(%user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn activate_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    AdminService::set_active(&state.db_pool, user_id, true).await?;
    Ok(Json(json!({ "message": "user activated successfully" })))
}

/// PUT /api/v1/admin/users/{id}/verify-insurance
#[instrument(skip_all, fields(%user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn verify_insurance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    AdminService::verify_insurance(&state.db_pool, user_id).await?;
    Ok(Json(json!({ "message": "insurance verified successfully" })))
}

/// DELETE /api/v1/admin/jobs/{id}
#[instrument(skip_all, fields(%job_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn remove_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    AdminService::remove_job(&state.db_pool, job_id).await?;
    Ok(Json(json!({ "message": "job removed successfully" })))
}

/// DELETE /api/v1/admin/equipment/{id}
#[instrument(skip_all, fields(%equipment_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn remove_equipment(
    State(state): State<Arc<AppState>>,
    Path(equipment_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    AdminService::remove_equipment(&state.db_pool, equipment_id).await?;
    Ok(Json(json!({ "message": "equipment removed successfully" })))
}
