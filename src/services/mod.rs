//! # Business Logic Services
//!
//! Services encapsulate the marketplace rules and the database work behind each
//! endpoint, so handlers stay thin.
//!
//! ## Available Services
//!
//! - **Users** (`user`) - Registration, credentials and profiles
//! - **Jobs** (`job`) - Job listings, applications and the job lifecycle
//! - **Equipment** (`equipment`) - Equipment listings and rentals
//! - **Payments** (`payment`) - Payment intents and reconciliation with the processor
//! - **Reviews** (`review`) - Reviews between parties of completed transactions
//! - **Admin** (`admin`) - Moderation and platform statistics
//! - **JWT** (`jwt`) - Access and refresh token management
//! - **Geocoding** (`geocoding`), **Storage** (`storage`) - External collaborators
//! - **Rental** (`rental`), **Visibility** (`visibility`) - Pure marketplace rules

pub mod admin;
pub mod equipment;
pub mod geocoding;
pub mod job;
pub mod jwt;
pub mod password;
pub mod payment;
pub mod rental;
pub mod review;
pub mod storage;
pub mod user;
pub mod visibility;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretSlice, SecretString};
use tracing::info;

use crate::config::AppConfig;
use crate::models::Services;
use geocoding::{GeocodioGeocoder, NoopGeocoder};
use payment::{LogPaymentProcessor, StripeProcessor};
use storage::LocalStorage;

impl Services {
    /// Picks the collaborators for the configured environment.
    ///
    /// Without a Stripe key payments go through [`LogPaymentProcessor`], and without a
    /// Geocodio key listings fall back to their owner's location.
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let payment_processor: Arc<dyn payment::PaymentProcessor> = match &config.stripe {
            Some(stripe) => {
                info!("Using [StripeProcessor] for payments");
                Arc::new(StripeProcessor::new(
                    SecretString::from(stripe.secret_key.expose_secret().to_owned()),
                    stripe.api_base.clone(),
                )?)
            }
            None => {
                info!("Using [LogPaymentProcessor (Mock)] for payments");
                Arc::new(LogPaymentProcessor::new())
            }
        };

        let geocoder: Arc<dyn geocoding::Geocoder> = match &config.geocodio {
            Some(geocodio) => {
                info!("Using [GeocodioGeocoder] for addresses");
                Arc::new(GeocodioGeocoder::new(
                    SecretString::from(geocodio.api_key.expose_secret().to_owned()),
                    geocodio.base_url.clone(),
                )?)
            }
            None => {
                info!("Geocoding disabled, using [NoopGeocoder]");
                Arc::new(NoopGeocoder)
            }
        };

        let storage = Arc::new(LocalStorage::new(
            config.storage.upload_dir.clone(),
            config.storage.public_base_url.clone(),
            SecretSlice::from(config.storage.signing_secret.expose_secret().to_vec()),
        ));

        Ok(Self {
            payment_processor,
            geocoder,
            storage,
        })
    }
}
