//! # Mowsy - Lawn Care Marketplace Backend
//!
//! Neighbours post lawn-care jobs and rent out equipment. Listings are only shown
//! to people in the same zip code or elementary school district.
//!
//! ## Modules
//!
//! - [`config`] - Environment configuration
//! - [`error`] - Central error type and its HTTP mapping
//! - [`handlers`] - HTTP request handlers for various endpoints
//! - [`middleware`] - Authentication, insurance gate, admin key and rate limiting
//! - [`models`] - Database rows, API payloads and state machines
//! - [`services`] - Business logic and external collaborators
//! - [`utils`] - Utility functions and constants

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use jsonwebtoken::{DecodingKey, EncodingKey};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::config::AppConfig;
use crate::handlers::*;
use crate::middleware::{
    admin_middleware, auth_middleware, insurance_middleware, optional_auth_middleware,
    rate_limit_middleware,
};
use crate::models::{AppState, Services};
use crate::services::jwt::JwtService;
use crate::utils::constant::{CACHE_CLEANUP_INTERVAL, MAX_UPLOAD_BODY_SIZE};

/// Creates an Axum router with collaborators picked from the configuration.
///
/// This is a convenience function that calls [`app_with_services`] with
/// [`Services::from_config`].
pub fn app(db_pool: PgPool, config: &AppConfig) -> Result<Router, reqwest::Error> {
    let services = Services::from_config(config)?;
    Ok(app_with_services(db_pool, config, services))
}

/// Creates an Axum router with application routes and state.
///
/// The state is marked ready before the router is returned, so callers must run
/// migrations first.
///
/// # Arguments
///
/// * `db_pool` - PostgreSQL database connection pool
/// * `config` - Loaded configuration
/// * `services` - Payment processor, geocoder and object storage
pub fn app_with_services(db_pool: PgPool, config: &AppConfig, services: Services) -> Router {
    let state = build_state(db_pool, config, services);
    spawn_cleanup_task(Arc::clone(&state));
    state.mark_ready();
    router(state, config.storage.served_dir())
}

/// Builds the shared application state.
pub fn build_state(db_pool: PgPool, config: &AppConfig, services: Services) -> Arc<AppState> {
    let jwt_service = JwtService::new(
        EncodingKey::from_secret(config.jwt_secret.expose_secret()),
        DecodingKey::from_secret(config.jwt_secret.expose_secret()),
        db_pool.clone(),
    );
    let admin_api_key = config
        .admin_api_key
        .as_ref()
        .map(|key| SecretString::from(key.expose_secret().to_owned()));

    Arc::new(AppState::new(
        db_pool,
        jwt_service,
        services,
        admin_api_key,
        config.rate_limit_per_minute,
    ))
}

fn spawn_cleanup_task(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_CLEANUP_INTERVAL);
        interval.tick().await; // first tick completes immediately
        loop {
            interval.tick().await;
            state.rate_limiter.cleanup_expired_entries();
        }
    });
}

/// Wires every route under `/api/v1`, plus `/ready` and the `/uploads` file server.
pub fn router(state: Arc<AppState>, uploads_dir: PathBuf) -> Router {
    let public_routes = Router::new()
        .route("/health-check", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .route("/users/{id}/profile", get(get_public_profile))
        .route("/users/{id}/reviews", get(get_user_reviews))
        .route("/jobs/{id}", get(get_job))
        .route("/equipment/{id}", get(get_equipment))
        .route(
            "/upload/direct",
            put(direct_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_SIZE)),
        );

    let listing_routes = Router::new()
        .route("/jobs", get(list_jobs))
        .route("/equipment", get(list_equipment))
        .route_layer(from_fn_with_state(
            Arc::clone(&state),
            optional_auth_middleware,
        ));

    let protected_routes = Router::new()
        .route("/users/me", get(get_me).put(update_me))
        .route("/users/me/insurance", post(upload_insurance))
        .route("/jobs", post(create_job))
        .route("/jobs/my", get(my_jobs))
        .route("/jobs/{id}", put(update_job).delete(delete_job))
        .route("/jobs/{id}/apply", post(apply_to_job))
        .route("/jobs/{id}/applications", get(list_applications))
        .route(
            "/jobs/{id}/applications/{app_id}",
            put(decide_application),
        )
        .route("/jobs/{id}/cancel", post(cancel_job))
        .route("/equipment", post(create_equipment))
        .route("/equipment/my", get(my_equipment))
        .route(
            "/equipment/{id}",
            put(update_equipment).delete(delete_equipment),
        )
        .route("/equipment/{id}/rent", post(rent_equipment))
        .route("/equipment/{id}/rentals", get(list_rentals))
        .route(
            "/equipment/{id}/rentals/{rental_id}",
            put(update_rental_status),
        )
        .route(
            "/equipment/rentals/{rental_id}/cancel",
            post(cancel_rental),
        )
        .route("/reviews", post(create_review))
        .route("/payments/create-intent", post(create_payment_intent))
        .route("/payments/confirm", post(confirm_payment))
        .route("/payments/history", get(payment_history))
        .route("/payments/{id}", get(get_payment))
        .route(
            "/upload/image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_SIZE)),
        )
        .route("/upload/presigned-url", post(presigned_upload_url))
        .route("/upload/file", delete(delete_file))
        .route_layer(from_fn_with_state(Arc::clone(&state), auth_middleware));

    // auth is added last so it runs before the insurance check
    let insured_routes = Router::new()
        .route("/jobs/{id}/complete", post(complete_job))
        .route(
            "/equipment/rentals/{rental_id}/complete",
            post(complete_rental),
        )
        .route_layer(from_fn_with_state(
            Arc::clone(&state),
            insurance_middleware,
        ))
        .route_layer(from_fn_with_state(Arc::clone(&state), auth_middleware));

    let admin_routes = Router::new()
        .route("/stats", get(get_stats))
        .route("/users", get(list_users))
        .route("/users/{id}/deactivate", put(deactivate_user))
        .route("/users/{id}/activate", put(activate_user))
        .route("/users/{id}/verify-insurance", put(verify_insurance))
        .route("/jobs/{id}", delete(remove_job))
        .route("/equipment/{id}", delete(remove_equipment))
        .route_layer(from_fn_with_state(Arc::clone(&state), admin_middleware));

    let api = Router::new()
        .merge(public_routes)
        .merge(listing_routes)
        .merge(protected_routes)
        .merge(insured_routes)
        .nest("/admin", admin_routes)
        .layer(from_fn_with_state(
            Arc::clone(&state),
            rate_limit_middleware,
        ));

    info!(uploads_dir = %uploads_dir.display(), "Serving uploaded files");

    Router::new()
        .route("/ready", get(readiness))
        .nest("/api/v1", api)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
