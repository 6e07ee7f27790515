//! # Rate Limiting Middleware
//!
//! Sliding window request limiter keyed by the caller: the user id when a valid bearer
//! token is present, otherwise the client IP.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::{debug, info, instrument, warn};

use crate::error::AppError;
use crate::models::AppState;

/// Per-client request timestamps within the current window.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: DashMap::new(),
        }
    }

    /// Records a request for `key` and returns whether it is allowed.
    ///
    /// Rejected requests are not recorded, so a client that backs off regains
    /// capacity as its earlier requests leave the window.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self.hits.entry(key.to_string()).or_default();
        while entry
            .front()
            .is_some_and(|first| now.duration_since(*first) >= self.window)
        {
            entry.pop_front();
        }

        if entry.len() >= self.limit {
            return false;
        }
        entry.push_back(now);
        true
    }

    #[inline]
    pub fn tracked_clients(&self) -> usize {
        self.hits.len()
    }

    /// Drops clients whose most recent request has left the window.
    #[instrument(skip_all)]
    pub fn cleanup_expired_entries(&self) {
        let initial_size = self.hits.len();
        self.hits.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|last| last.elapsed() < self.window)
        });
        let final_size = self.hits.len();

        if initial_size != final_size {
            info!(
                initial_size,
                final_size,
                removed = initial_size - final_size,
                "Cleaned up expired rate limit entries"
            );
        } else {
            debug!(size = final_size, "No rate limit entries expired");
        }
    }
}

fn client_key(state: &AppState, req: &Request) -> String {
    let bearer_subject = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.jwt_service.validate_access_token(token).ok())
        .map(|claims| claims.sub);
    if let Some(user_id) = bearer_subject {
        return format!("user:{user_id}");
    }

    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return format!("ip:{ip}");
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

/// Rejects requests beyond the configured rate with `429 Too Many Requests`.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(&state, &req);
    if !state.rate_limiter.check(&key) {
        warn!(client = %key, "Rate limit exceeded");
        return AppError::TooManyRequests.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_beyond_limit_are_rejected() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at("ip:1", now));
        assert!(limiter.check_at("ip:1", now));
        assert!(limiter.check_at("ip:1", now));
        assert!(!limiter.check_at("ip:1", now));
        assert!(limiter.check_at("ip:2", now));
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at("user:a", start));
        assert!(limiter.check_at("user:a", start + Duration::from_secs(30)));
        assert!(!limiter.check_at("user:a", start + Duration::from_secs(59)));
        assert!(limiter.check_at("user:a", start + Duration::from_secs(60)));
        assert!(!limiter.check_at("user:a", start + Duration::from_secs(61)));
    }

    #[test]
    fn cleanup_drops_idle_clients() {
        let limiter = RateLimiter::new(5, Duration::from_millis(10));
        assert!(limiter.check("ip:idle"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("ip:busy"));
        limiter.cleanup_expired_entries();
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
