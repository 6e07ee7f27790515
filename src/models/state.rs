use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::SecretString;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::middleware::rate_limit::RateLimiter;
use crate::services::geocoding::Geocoder;
use crate::services::jwt::JwtService;
use crate::services::payment::PaymentProcessor;
use crate::services::storage::ObjectStorage;
use crate::utils::constant::RATE_LIMIT_WINDOW;

/// External collaborators, injected so tests can swap in mocks.
#[derive(Clone)]
pub struct Services {
    pub payment_processor: Arc<dyn PaymentProcessor>,
    pub geocoder: Arc<dyn Geocoder>,
    pub storage: Arc<dyn ObjectStorage>,
}

/// Application state shared across requests. Needs to be thread-safe.
pub struct AppState {
    /// Sliding window request counter, keyed by user id or client IP.
    pub rate_limiter: RateLimiter,
    /// The PostgreSQL database connection pool.
    pub db_pool: PgPool,
    /// JWT service for token generation and validation.
    pub jwt_service: JwtService,
    pub services: Services,
    /// Key expected in the `X-Admin-Key` header. Admin routes are disabled when `None`.
    pub admin_api_key: Option<SecretString>,
    ready: AtomicBool,
}

impl AppState {
    /// Creates a new application state with the provided services.
    ///
    /// The state starts out not ready; call [`AppState::mark_ready`] once startup
    /// has finished.
    pub fn new(
        db_pool: PgPool,
        jwt_service: JwtService,
        services: Services,
        admin_api_key: Option<SecretString>,
        rate_limit_per_window: usize,
    ) -> Self {
        info!("Initializing application state");
        debug!(rate_limit_per_window, "Creating rate limit cache");

        Self {
            rate_limiter: RateLimiter::new(rate_limit_per_window, RATE_LIMIT_WINDOW),
            db_pool,
            jwt_service,
            services,
            admin_api_key,
            ready: AtomicBool::new(false),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
        info!("Application marked ready");
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}
