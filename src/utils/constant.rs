//! # Application Constants
//!
//! This module defines configuration constants used throughout the Mowsy backend.
//! These constants control token lifetimes, rate limits, pagination and upload limits.

use std::time::Duration;

/// Expiration time for JWT access tokens
pub const ACCESS_TOKEN_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Expiration time for refresh tokens
///
/// Refresh tokens have longer validity to reduce frequent re-authentication.
pub const REFRESH_TOKEN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60); // 7 days

/// Default number of requests a single client may issue per [`RATE_LIMIT_WINDOW`]
pub const DEFAULT_RATE_LIMIT_PER_WINDOW: usize = 100;

/// Sliding window used by the request rate limiter
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Interval for automatic rate limit cache cleanup
///
/// Background task runs at this interval to drop clients with no recent requests.
pub const CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Default page size for paginated listings
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page size a client may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Largest accepted upload body
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Request body limit on upload routes, leaving room for multipart framing
pub const MAX_UPLOAD_BODY_SIZE: usize = MAX_UPLOAD_SIZE + 64 * 1024;

/// Validity of a presigned upload URL
pub const PRESIGNED_URL_EXPIRY: Duration = Duration::from_secs(60 * 60);

/// Timeout applied to geocoding requests
pub const GEOCODER_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout applied to payment processor requests
pub const PAYMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Currency used when a payment intent request does not name one
pub const DEFAULT_CURRENCY: &str = "usd";

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;
