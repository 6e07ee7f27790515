//! # Equipment Handlers
//!
//! Equipment listings and the rental workflow. Rental dates are RFC 3339
//! timestamps; the rental price is the inclusive day count times the daily rate.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::current_viewer;
use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::{AppState, EquipmentResponse, RentalResponse};
use crate::services::equipment::{
    CompleteRentalRequest, CreateEquipmentRequest, EquipmentFilters, EquipmentService,
    RentalRequest, RentalStatusRequest, UpdateEquipmentRequest,
};

/// Lists equipment newest first, available items only unless `is_available=false`.
///
/// GET /api/v1/equipment ?visibility&zip_code&district&category&fuel_type&power_type&min_price&max_price&is_available&filter&page&limit
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn list_equipment(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthUser>>,
    Query(filters): Query<EquipmentFilters>,
) -> AppResult<Json<Vec<EquipmentResponse>>> {
    let viewer = match filters.filter {
        true => current_viewer(&state, user).await?,
        false => None,
    };
    let items = EquipmentService::list(&state.db_pool, filters, viewer.as_ref()).await?;
    debug!(count = items.len(), "Equipment listed");
    Ok(Json(items))
}

/// GET /api/v1/equipment/{id}
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn get_equipment(
    State(state): State<Arc<AppState>>,
    Path(equipment_id): Path<Uuid>,
) -> AppResult<Json<EquipmentResponse>> {
    Ok(Json(
        EquipmentService::get(&state.db_pool, equipment_id).await?,
    ))
}

/// POST /api/v1/equipment
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn create_equipment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateEquipmentRequest>,
) -> AppResult<impl IntoResponse> {
    let item = EquipmentService::create(
        &state.db_pool,
        state.services.geocoder.as_ref(),
        user.user_id,
        payload,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/v1/equipment/my
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn my_equipment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<EquipmentResponse>>> {
    Ok(Json(
        EquipmentService::list_mine(&state.db_pool, user.user_id).await?,
    ))
}

/// PUT /api/v1/equipment/{id}
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn update_equipment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(equipment_id): Path<Uuid>,
    Json(payload): Json<UpdateEquipmentRequest>,
) -> AppResult<Json<EquipmentResponse>> {
    let item = EquipmentService::update(
        &state.db_pool,
        state.services.geocoder.as_ref(),
        equipment_id,
        user.user_id,
        payload,
    )
    .await?;
    Ok(Json(item))
}

/// DELETE /api/v1/equipment/{id}
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn delete_equipment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(equipment_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    EquipmentService::delete(&state.db_pool, equipment_id, user.user_id).await?;
    Ok(Json(json!({ "message": "equipment deleted successfully" })))
}

/// Requests a rental.
///
/// POST /api/v1/equipment/{id}/rent
///
/// # Returns
///
/// - `201 Created` with the `requested` rental and its total price
/// - `400 Bad Request` - Own equipment, invalid dates, or
///   "equipment is not available for the selected dates"
/// - `404 Not Found` - Equipment missing or unavailable
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn rent_equipment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(equipment_id): Path<Uuid>,
    Json(payload): Json<RentalRequest>,
) -> AppResult<impl IntoResponse> {
    let rental =
        EquipmentService::request_rental(&state.db_pool, equipment_id, user.user_id, payload)
            .await?;
    Ok((StatusCode::CREATED, Json(rental)))
}

/// GET /api/v1/equipment/{id}/rentals
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn list_rentals(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(equipment_id): Path<Uuid>,
) -> AppResult<Json<Vec<RentalResponse>>> {
    Ok(Json(
        EquipmentService::rentals(&state.db_pool, equipment_id, user.user_id).await?,
    ))
}

/// Owner approves or cancels a rental.
///
/// PUT /api/v1/equipment/{id}/rentals/{rental_id}
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn update_rental_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((equipment_id, rental_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<RentalStatusRequest>,
) -> AppResult<Json<RentalResponse>> {
    let rental = EquipmentService::update_rental_status(
        &state.db_pool,
        equipment_id,
        rental_id,
        user.user_id,
        payload.status,
    )
    .await?;
    Ok(Json(rental))
}

/// Completes an active rental. Sits behind the insurance gate.
///
/// POST /api/v1/equipment/rentals/{rental_id}/complete
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn complete_rental(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(rental_id): Path<Uuid>,
    Json(payload): Json<CompleteRentalRequest>,
) -> AppResult<Json<RentalResponse>> {
    let rental =
        EquipmentService::complete_rental(&state.db_pool, rental_id, user.user_id, payload)
            .await?;
    Ok(Json(rental))
}

/// POST /api/v1/equipment/rentals/{rental_id}/cancel
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn cancel_rental(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(rental_id): Path<Uuid>,
) -> AppResult<Json<RentalResponse>> {
    Ok(Json(
        EquipmentService::cancel_rental(&state.db_pool, rental_id, user.user_id).await?,
    ))
}
