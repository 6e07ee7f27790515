//! # User Service
//!
//! Registration, credential checks, profile updates and public profile lookups.
//! Addresses are geocoded on registration and whenever the address changes; a failed
//! lookup leaves the location fields untouched.

use std::collections::HashMap;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{User, UserPublicProfile};
use crate::services::geocoding::{Geocoder, locate};
use crate::services::password::{hash_password, verify_password};
use crate::utils::validator::{
    EMAIL_REGEX, sanitize, validate_password, validate_phone, validate_zip_code,
};

const PUBLIC_PROFILE_COLUMNS: &str =
    "id, first_name, last_name, elementary_school_district_name, insurance_verified, created_at";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(regex(path = "*EMAIL_REGEX", message = "invalid email format"))]
    pub email: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    #[validate(custom(function = "validate_zip_code"))]
    pub zip_code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(regex(path = "*EMAIL_REGEX", message = "invalid email format"))]
    pub email: String,
    pub password: String,
}

/// Partial profile update. Absent or empty fields keep their current value.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[validate(custom(function = "validate_zip_code"))]
    pub zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InsuranceDocumentRequest {
    pub document_url: String,
}

/// Trims the value and drops it when nothing is left.
fn provided(value: Option<String>) -> Option<String> {
    value.map(|v| sanitize(&v)).filter(|v| !v.is_empty())
}

fn full_address(user: &User) -> String {
    format!(
        "{}, {}, {} {}",
        user.address, user.city, user.state, user.zip_code
    )
}

pub struct UserService;

impl UserService {
    /// Creates an active account and geocodes its address.
    ///
    /// # Returns
    ///
    /// * `Ok(User)` - The stored user, with location fields when geocoding succeeded
    /// * `Err(AppError::Validation)` - Malformed email, short password, bad phone or zip
    /// * `Err(AppError::BadRequest)` - Email already registered
    #[instrument(skip_all)]
    pub async fn register(
        pool: &PgPool,
        geocoder: &dyn Geocoder,
        request: RegisterRequest,
    ) -> AppResult<User> {
        request.validate()?;
        let email = sanitize(&request.email).to_ascii_lowercase();

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(&email)
                .fetch_one(pool)
                .await?;
        if exists {
            debug!("Registration attempted with existing email");
            return Err(AppError::BadRequest("user with this email already exists"));
        }

        let password_hash = hash_password(&request.password).map_err(|e| {
            warn!(error = %e, "Failed to hash password");
            AppError::Internal
        })?;

        let user: User = sqlx::query_as(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, phone, address, city, state, zip_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(sanitize(&request.first_name))
        .bind(sanitize(&request.last_name))
        .bind(sanitize(&request.phone))
        .bind(sanitize(&request.address))
        .bind(sanitize(&request.city))
        .bind(sanitize(&request.state))
        .bind(sanitize(&request.zip_code))
        .fetch_one(pool)
        .await?;

        info!(user_id = %user.id, "User registered");

        if user.address.is_empty() {
            return Ok(user);
        }
        Self::refresh_location(pool, geocoder, user).await
    }

    /// Checks credentials of an active user.
    ///
    /// Unknown emails, inactive accounts and wrong passwords all yield the same
    /// `401 invalid credentials`.
    #[instrument(skip_all)]
    pub async fn authenticate(pool: &PgPool, request: LoginRequest) -> AppResult<User> {
        request.validate()?;
        let email = sanitize(&request.email).to_ascii_lowercase();

        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE email = $1 AND is_active = TRUE")
                .bind(&email)
                .fetch_optional(pool)
                .await?;

        let Some(user) = user else {
            debug!("Login for unknown or inactive account");
            return Err(AppError::Unauthorized("invalid credentials"));
        };

        let matches = verify_password(&request.password, &user.password_hash).map_err(|e| {
            warn!(error = %e, user_id = %user.id, "Stored password hash is unreadable");
            AppError::Internal
        })?;
        if !matches {
            debug!(user_id = %user.id, "Wrong password");
            return Err(AppError::Unauthorized("invalid credentials"));
        }

        Ok(user)
    }

    /// Loads an active user.
    pub async fn get_active(pool: &PgPool, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as("SELECT * FROM users WHERE id = $1 AND is_active = TRUE")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("user not found"))
    }

    /// Applies a partial profile update and re-geocodes when the address changed.
    #[instrument(skip(pool, geocoder, request))]
    pub async fn update(
        pool: &PgPool,
        geocoder: &dyn Geocoder,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> AppResult<User> {
        request.validate()?;
        Self::get_active(pool, user_id).await?;

        let address = provided(request.address);
        let address_changed = address.is_some();

        let user: User = sqlx::query_as(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                address = COALESCE($5, address),
                city = COALESCE($6, city),
                state = COALESCE($7, state),
                zip_code = COALESCE($8, zip_code),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(provided(request.first_name))
        .bind(provided(request.last_name))
        .bind(provided(request.phone))
        .bind(address)
        .bind(provided(request.city))
        .bind(provided(request.state))
        .bind(provided(request.zip_code))
        .fetch_one(pool)
        .await?;

        info!("User profile updated");
        if !address_changed {
            return Ok(user);
        }
        Self::refresh_location(pool, geocoder, user).await
    }

    async fn refresh_location(
        pool: &PgPool,
        geocoder: &dyn Geocoder,
        user: User,
    ) -> AppResult<User> {
        let Some(location) = locate(geocoder, &full_address(&user)).await else {
            return Ok(user);
        };

        let user = sqlx::query_as(
            r#"
            UPDATE users SET
                latitude = $2,
                longitude = $3,
                zip_code = COALESCE($4, zip_code),
                elementary_school_district_name = COALESCE($5, elementary_school_district_name),
                elementary_school_district_code = COALESCE($6, elementary_school_district_code),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(location.zip_code)
        .bind(location.district_name)
        .bind(location.district_code)
        .fetch_one(pool)
        .await?;

        debug!("User location refreshed");
        Ok(user)
    }

    /// Records the insurance document URL. Any earlier verification is revoked.
    #[instrument(skip(pool, request))]
    pub async fn upload_insurance(
        pool: &PgPool,
        user_id: Uuid,
        request: InsuranceDocumentRequest,
    ) -> AppResult<User> {
        let document_url = sanitize(&request.document_url);
        if document_url.is_empty() {
            return Err(AppError::BadRequest("document_url is required"));
        }

        let user: Option<User> = sqlx::query_as(
            r#"
            UPDATE users SET
                insurance_document_url = $2,
                insurance_verified = FALSE,
                insurance_verified_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&document_url)
        .fetch_optional(pool)
        .await?;

        let user = user.ok_or(AppError::NotFound("user not found"))?;
        info!("Insurance document uploaded");
        Ok(user)
    }

    /// Public profile of an active user.
    pub async fn public_profile(pool: &PgPool, user_id: Uuid) -> AppResult<UserPublicProfile> {
        sqlx::query_as(&format!(
            "SELECT {PUBLIC_PROFILE_COLUMNS} FROM users WHERE id = $1 AND is_active = TRUE"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("user not found"))
    }

    /// Public profiles for a batch of users, keyed by id. Unknown ids are skipped.
    pub async fn public_profiles(
        pool: &PgPool,
        user_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, UserPublicProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let profiles: Vec<UserPublicProfile> = sqlx::query_as(&format!(
            "SELECT {PUBLIC_PROFILE_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(user_ids)
        .fetch_all(pool)
        .await?;

        Ok(profiles
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect())
    }
}
