//! # Authentication Handlers
//!
//! Password based authentication issuing JWT access tokens and rotating refresh
//! tokens. The flow consists of:
//!
//! 1. Registering or logging in with email and password
//! 2. Receiving an access token (1 hour) and a refresh token (7 days)
//! 3. Exchanging the refresh token for a new pair, which revokes the old one
//! 4. Logging out, which revokes the refresh token

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::models::{AppState, User, UserResponse};
use crate::services::user::{LoginRequest, RegisterRequest, UserService};

/// Response containing JWT tokens after successful authentication
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

/// Request payload for refreshing or revoking JWT tokens
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

async fn issue_tokens(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let token_pair = state
        .jwt_service
        .create_token_pair(user.id, &user.email)
        .await?;
    debug!("JWT token pair created");

    Ok(AuthResponse {
        access_token: token_pair.access_token,
        refresh_token: token_pair.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: token_pair.expires_in,
        user: user.to_response(),
    })
}

/// Registers a new account and signs it in.
///
/// POST /api/v1/auth/register
///
/// # Returns
///
/// - `201 Created` with [`AuthResponse`]
/// - `400 Bad Request` - Invalid input or email already registered
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let user = UserService::register(
        &state.db_pool,
        state.services.geocoder.as_ref(),
        payload,
    )
    .await?;

    let response = issue_tokens(&state, &user).await?;
    info!(user_id = %user.id, "Registration completed");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Logs in with email and password.
///
/// POST /api/v1/auth/login
///
/// # Returns
///
/// - `200 OK` with [`AuthResponse`]
/// - `401 Unauthorized` - Wrong credentials or inactive account
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = UserService::authenticate(&state.db_pool, payload).await?;
    let response = issue_tokens(&state, &user).await?;
    info!(user_id = %user.id, "Login successful");
    Ok(Json(response))
}

/// Refreshes JWT token pair using a valid refresh token.
///
/// POST /api/v1/auth/refresh
///
/// # Security
///
/// - Refresh tokens are validated against the database
/// - The presented refresh token is revoked before the new pair is issued
/// - Tokens of deactivated users are refused
///
/// # Returns
///
/// - `200 OK` - New token pair issued successfully
/// - `401 Unauthorized` - Invalid or expired refresh token
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<Json<AuthResponse>> {
    debug!("Processing token refresh request");

    let user_id = state
        .jwt_service
        .consume_refresh_token(&payload.refresh_token)
        .await
        .inspect_err(|e| warn!(error = %e, "Token refresh failed"))?;

    let user = UserService::get_active(&state.db_pool, user_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => AppError::Unauthorized("invalid refresh token"),
            other => other,
        })?;

    let response = issue_tokens(&state, &user).await?;
    info!(user_id = %user.id, "Token refresh successful");
    Ok(Json(response))
}

/// Revokes a refresh token. Unknown tokens are ignored.
///
/// POST /api/v1/auth/logout
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .jwt_service
        .revoke_refresh_token(&payload.refresh_token)
        .await?;
    info!("Refresh token revoked");
    Ok(Json(json!({ "message": "logged out successfully" })))
}
