//! # Application Configuration
//!
//! All runtime configuration is read from the environment once at startup. Secrets
//! may be supplied through `*_FILE` variables pointing at mounted files, see
//! [`get_secret`].
//!
//! ## Environment Variables
//!
//! - `APP_ENV` - "production" requires real collaborators, anything else allows dev mocks
//! - `JWT_SECRET` / `JWT_SECRET_FILE` - Required, HS256 signing secret
//! - `ADMIN_API_KEY` / `ADMIN_API_KEY_FILE` - Optional, admin endpoints answer 503 without it
//! - `BIND_ADDRESS` - Listen address, defaults to `0.0.0.0:8080`
//! - `STRIPE_SECRET_KEY` / `STRIPE_SECRET_KEY_FILE` - Payment processor key
//! - `STRIPE_API_BASE` - Payment processor base URL, defaults to Stripe's public API
//! - `GEOCODIO_API_KEY` - Geocoding key; empty disables geocoding
//! - `GEOCODIO_BASE_URL` - Geocoding base URL
//! - `UPLOAD_DIR` - Local object storage root, defaults to `uploads`
//! - `PUBLIC_BASE_URL` - Externally reachable base URL used in file links
//! - `STORAGE_SIGNING_SECRET` - Secret for presigned upload URLs, defaults to the JWT secret
//! - `RATE_LIMIT_PER_MINUTE` - Requests per client per minute, defaults to 100

use std::env;
use std::path::PathBuf;

use secrecy::{SecretSlice, SecretString};
use thiserror::Error;
use tracing::{info, warn};

use crate::services::storage::KEY_PREFIX;
use crate::utils::constant::DEFAULT_RATE_LIMIT_PER_WINDOW;
use crate::utils::secret::get_secret;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_GEOCODIO_BASE_URL: &str = "https://api.geocod.io/v1.7";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` must be set")]
    Missing(&'static str),
    #[error("environment variable `{name}` is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Deployment flavour selected by `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_env() -> Self {
        match env::var("APP_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "production" => Environment::Production,
            _ => Environment::Development,
        }
    }

    #[inline]
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub api_base: String,
}

#[derive(Debug)]
pub struct GeocodioConfig {
    pub api_key: SecretString,
    pub base_url: String,
}

#[derive(Debug)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub signing_secret: SecretSlice<u8>,
}

impl StorageConfig {
    /// Directory holding stored objects, served under `/uploads`.
    pub fn served_dir(&self) -> PathBuf {
        self.upload_dir.join(KEY_PREFIX.trim_end_matches('/'))
    }
}

#[derive(Debug)]
pub struct AppConfig {
    pub environment: Environment,
    pub bind_address: String,
    pub jwt_secret: SecretSlice<u8>,
    pub admin_api_key: Option<SecretString>,
    pub stripe: Option<StripeConfig>,
    pub geocodio: Option<GeocodioConfig>,
    pub storage: StorageConfig,
    pub rate_limit_per_minute: usize,
}

impl AppConfig {
    /// Loads and validates configuration from the process environment.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] - A required variable is unset
    /// - [`ConfigError::Invalid`] - A variable could not be parsed, or production
    ///   mode is missing a payment processor key
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();

        let jwt_secret =
            get_secret("JWT_SECRET_FILE", "JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let admin_api_key = get_secret("ADMIN_API_KEY_FILE", "ADMIN_API_KEY").map(SecretString::from);
        if admin_api_key.is_none() {
            warn!("ADMIN_API_KEY is not set, admin endpoints are disabled");
        }

        let stripe = get_secret("STRIPE_SECRET_KEY_FILE", "STRIPE_SECRET_KEY").map(|key| {
            StripeConfig {
                secret_key: SecretString::from(key),
                api_base: env::var("STRIPE_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string()),
            }
        });
        if stripe.is_none() && environment.is_production() {
            return Err(ConfigError::Invalid {
                name: "STRIPE_SECRET_KEY",
                reason: "required when APP_ENV=production".to_string(),
            });
        }

        let geocodio = get_secret("GEOCODIO_API_KEY_FILE", "GEOCODIO_API_KEY").map(|key| {
            GeocodioConfig {
                api_key: SecretString::from(key),
                base_url: env::var("GEOCODIO_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_GEOCODIO_BASE_URL.to_string()),
            }
        });

        let signing_secret = get_secret("STORAGE_SIGNING_SECRET_FILE", "STORAGE_SIGNING_SECRET")
            .unwrap_or_else(|| jwt_secret.clone());

        let bind_address =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());

        let storage = StorageConfig {
            upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into())),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://{bind_address}")),
            signing_secret: SecretSlice::from(signing_secret.into_bytes()),
        };

        let rate_limit_per_minute = match env::var("RATE_LIMIT_PER_MINUTE") {
            Ok(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                name: "RATE_LIMIT_PER_MINUTE",
                reason: format!("{e}"),
            })?,
            Err(_) => DEFAULT_RATE_LIMIT_PER_WINDOW,
        };

        info!(
            ?environment,
            %bind_address,
            stripe_configured = stripe.is_some(),
            geocodio_configured = geocodio.is_some(),
            rate_limit_per_minute,
            "Configuration loaded"
        );

        Ok(Self {
            environment,
            bind_address,
            jwt_secret: SecretSlice::from(jwt_secret.into_bytes()),
            admin_api_key,
            stripe,
            geocodio,
            storage,
            rate_limit_per_minute,
        })
    }
}

/// Reads the database connection string, honouring `DATABASE_URL_FILE`.
pub fn database_url() -> Result<String, ConfigError> {
    get_secret("DATABASE_URL_FILE", "DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))
}
