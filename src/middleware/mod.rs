pub mod admin;
pub mod auth;
pub mod insurance;
pub mod rate_limit;

pub use admin::admin_middleware;
pub use auth::{AuthUser, auth_middleware, optional_auth_middleware};
pub use insurance::insurance_middleware;
pub use rate_limit::{RateLimiter, rate_limit_middleware};
