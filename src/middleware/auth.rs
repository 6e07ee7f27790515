//! # Authentication Middleware
//!
//! This module contains the authentication middleware that validates JWT tokens
//! and provides user context to protected routes, plus an optional variant for
//! public listings that personalise results when a token is present.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, instrument, trace, warn};
use uuid::Uuid;

use crate::models::AppState;
use crate::services::jwt::Claims;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
}

fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, StatusCode> {
    match state.jwt_service.validate_access_token(token) {
        Ok(claims) => {
            let user_id = Uuid::try_parse(&claims.sub).map_err(|e| {
                error!(error = %e, "Failed to parse user ID from token claims");
                StatusCode::UNAUTHORIZED
            })?;
            Ok(AuthUser { user_id, claims })
        }
        Err(e) => {
            warn!(error = %e, "Token validation failed");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Authentication middleware for protecting routes
///
/// # Authentication Flow
///
/// 1. Extracts `Authorization` header with `Bearer <token>` format
/// 2. Validates the JWT token signature and expiration
/// 3. Parses user ID from token claims
/// 4. Adds [`AuthUser`] to request extensions for handler access
///
/// # Returns
///
/// - **Success**: Continues to next handler with user context
/// - **Failure**: Returns `401 Unauthorized` for invalid/missing tokens
#[instrument(
    skip_all,
    fields(
        method = %req.method(),
        uri = %req.uri(),
        request_id = %uuid::Uuid::new_v4()
    )
)]
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    trace!("Processing authentication middleware");

    let Some(token) = bearer_token(&req) else {
        warn!("Missing or malformed Authorization header");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let user = authenticate(&state, token)?;
    debug!(user_id = %user.user_id, "Authentication successful");
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Authentication middleware for public routes
///
/// A valid bearer token attaches [`AuthUser`] like [`auth_middleware`] does. A missing
/// or invalid token lets the request through anonymously.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(&req) {
        match authenticate(&state, token) {
            Ok(user) => {
                trace!(user_id = %user.user_id, "Optional authentication attached user");
                req.extensions_mut().insert(user);
            }
            Err(_) => debug!("Ignoring invalid token on public route"),
        }
    }
    next.run(req).await
}

/// Authenticated user information available to handlers
///
/// # Usage in Handlers
///
/// ```rust
/// use axum::{extract::Extension, response::IntoResponse};
/// use mowsy::middleware::AuthUser;
/// async fn protected_handler(Extension(user): Extension<AuthUser>) -> impl IntoResponse {
///     format!("Hello user: {}", user.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Unique identifier for the authenticated user
    pub user_id: Uuid,
    /// JWT claims containing additional token metadata
    pub claims: Claims,
}
