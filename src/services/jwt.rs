//! # JWT Service
//!
//! Issues and validates the bearer tokens used by every protected route.
//!
//! ## Features
//!
//! - HS256 access tokens carrying the user id and email
//! - Refresh tokens persisted as SHA-256 hashes in `refresh_tokens`
//! - Token rotation on refresh, revocation on logout
//!
//! ## Security
//!
//! - Refresh tokens are hashed before database storage
//! - Old refresh tokens are invalidated when new ones are issued (token rotation)

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, error, instrument, trace};
use uuid::Uuid;

use crate::utils::constant::*;

/// Errors that can occur during JWT operations
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Refresh token not found")]
    RefreshTokenNotFound,
}

/// JWT claims structure for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as string)
    pub sub: String,
    pub email: String,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
}

/// Token pair containing access and refresh tokens
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry time in seconds
    pub expires_in: u64,
}

fn hash_refresh_token(refresh_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(refresh_token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Service for managing JWT tokens and refresh token lifecycle
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    db_pool: PgPool,
}

impl JwtService {
    pub fn new(encoding_key: EncodingKey, decoding_key: DecodingKey, db_pool: PgPool) -> Self {
        Self {
            encoding_key,
            decoding_key,
            db_pool,
        }
    }

    /// Creates a new access and refresh token pair for the user.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError`] if token creation or database storage fails.
    #[instrument(skip(self, email))]
    pub async fn create_token_pair(&self, user_id: Uuid, email: &str) -> Result<TokenPair, JwtError> {
        trace!("Creating new token pair");

        let now = unix_now();
        let access_claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: now + ACCESS_TOKEN_EXPIRY.as_secs(),
            iat: now,
        };
        let access_token = encode(&Header::default(), &access_claims, &self.encoding_key)?;

        let refresh_token = Uuid::new_v4().to_string();
        let refresh_token_hash = hash_refresh_token(&refresh_token);
        let refresh_token_exp = now + REFRESH_TOKEN_EXPIRY.as_secs();

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, to_timestamp($3))
            "#,
        )
        .bind(user_id)
        .bind(&refresh_token_hash)
        .bind(refresh_token_exp as f64)
        .execute(&self.db_pool)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to store refresh token in database"))?;
        trace!("Refresh token stored in database");

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: ACCESS_TOKEN_EXPIRY.as_secs(),
        })
    }

    /// Validates an access token and returns its claims.
    ///
    /// Signature and expiry only, no database lookup.
    ///
    /// # Errors
    ///
    /// - [`JwtError::TokenExpired`] - Token has expired
    /// - [`JwtError::InvalidToken`] - Token is malformed or has invalid signature
    #[instrument(skip_all, fields(token_length = token.len()))]
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
            Ok(token_data) => {
                trace!(user_id = %token_data.claims.sub, "Access token validated successfully");
                Ok(token_data.claims)
            }
            Err(e) if e.kind() == &jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                debug!("Access token expired");
                Err(JwtError::TokenExpired)
            }
            Err(e) => {
                debug!(error = %e, "Invalid access token");
                Err(JwtError::InvalidToken)
            }
        }
    }

    /// Exchanges a refresh token for its owner, deleting it in the same statement.
    ///
    /// Returns the user id so the caller can check the account is still active
    /// before issuing a new pair with [`JwtService::create_token_pair`].
    ///
    /// # Errors
    ///
    /// - [`JwtError::RefreshTokenNotFound`] - Token not found or expired
    /// - [`JwtError::DatabaseError`] - Database operation failed
    #[instrument(skip_all, fields(token_length = refresh_token.len()))]
    pub async fn consume_refresh_token(&self, refresh_token: &str) -> Result<Uuid, JwtError> {
        let refresh_token_hash = hash_refresh_token(refresh_token);

        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1 AND expires_at > NOW()
            RETURNING user_id
            "#,
        )
        .bind(&refresh_token_hash)
        .fetch_optional(&self.db_pool)
        .await
        .inspect_err(|e| error!(error = %e, "Database error during refresh token lookup"))?;

        match user_id {
            Some(user_id) => {
                trace!(%user_id, "Refresh token consumed");
                Ok(user_id)
            }
            None => {
                debug!("Refresh token not found or expired");
                Err(JwtError::RefreshTokenNotFound)
            }
        }
    }

    /// Revokes a specific refresh token. Unknown tokens are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::DatabaseError`] if the database operation fails.
    #[instrument(skip_all, fields(token_length = refresh_token.len()))]
    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), JwtError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(hash_refresh_token(refresh_token))
            .execute(&self.db_pool)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to revoke refresh token"))?;

        if result.rows_affected() > 0 {
            debug!("Refresh token revoked successfully");
        } else {
            debug!("Refresh token not found for revocation");
        }
        Ok(())
    }

    /// Revokes all refresh tokens for a specific user, logging them out everywhere.
    #[instrument(skip(self))]
    pub async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<(), JwtError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db_pool)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to revoke user refresh tokens"))?;

        debug!(
            tokens_revoked = result.rows_affected(),
            "All refresh tokens revoked for user"
        );
        Ok(())
    }
}
