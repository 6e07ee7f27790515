//! # Payment Handlers
//!
//! Payment intents are created locally as `pending` and reconciled with the
//! processor when the client confirms them. A succeeded rental payment activates
//! the rental.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::{AppState, PaginatedResponse, PaginationQuery, PaymentResponse};
use crate::services::payment::{
    ConfirmPaymentRequest, CreatePaymentIntentRequest, PaymentService,
};

/// Creates a payment intent for a job or rental.
///
/// POST /api/v1/payments/create-intent
///
/// # Returns
///
/// - `201 Created` with `{client_secret, payment_id}`
/// - `400 Bad Request` - Invalid amount or ineligible target
/// - `502 Bad Gateway` - Payment processor failure
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn create_payment_intent(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreatePaymentIntentRequest>,
) -> AppResult<impl IntoResponse> {
    let response = PaymentService::create_intent(
        &state.db_pool,
        state.services.payment_processor.as_ref(),
        user.user_id,
        payload,
    )
    .await?;
    info!(payment_id = %response.payment_id, "Payment intent created");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Reconciles a payment with the processor's view of its intent.
///
/// POST /api/v1/payments/confirm
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<PaymentResponse>> {
    let payment = PaymentService::confirm(
        &state.db_pool,
        state.services.payment_processor.as_ref(),
        user.user_id,
        &payload.payment_intent_id,
    )
    .await?;
    Ok(Json(payment))
}

/// GET /api/v1/payments/history ?page&limit
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn payment_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(pagination): Query<PaginationQuery>,
) -> AppResult<Json<PaginatedResponse<PaymentResponse>>> {
    let history =
        PaymentService::history(&state.db_pool, user.user_id, pagination.resolve()).await?;
    Ok(Json(history))
}

/// GET /api/v1/payments/{id}
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<PaymentResponse>> {
    Ok(Json(
        PaymentService::get(&state.db_pool, user.user_id, payment_id).await?,
    ))
}
