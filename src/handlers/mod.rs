//! # HTTP Request Handlers
//!
//! This module contains all HTTP request handlers for the Mowsy API. Handlers
//! extract and deserialize the request, call into [`crate::services`] and map the
//! result to a response; failures surface as [`crate::error::AppError`].
//!
//! ## Available Handlers
//!
//! - **Authentication** (`auth`) - Registration, login and JWT token management
//! - **Health Check** (`health_check`) - Liveness and readiness probes
//! - **Users** (`user`) - Own account, public profiles and reviews
//! - **Jobs** (`job`), **Equipment** (`equipment`) - Listings and their workflows
//! - **Payments** (`payment`), **Reviews** (`review`), **Uploads** (`upload`)
//! - **Admin** (`admin`) - Moderation behind the admin key

mod admin;
mod auth;
mod equipment;
mod health_check;
mod job;
mod payment;
mod review;
mod upload;
mod user;

pub use admin::*;
pub use auth::*;
pub use equipment::*;
pub use health_check::*;
pub use job::*;
pub use payment::*;
pub use review::*;
pub use upload::*;
pub use user::*;

use axum::extract::Extension;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::AppState;
use crate::services::user::UserService;
use crate::services::visibility::Viewer;

/// Loads the location of an authenticated caller for visibility filtering.
///
/// Anonymous callers and unknown or inactive users yield `None`; database
/// errors are returned.
async fn current_viewer(
    state: &AppState,
    user: Option<Extension<AuthUser>>,
) -> AppResult<Option<Viewer>> {
    let Some(Extension(user)) = user else {
        return Ok(None);
    };
    match UserService::get_active(&state.db_pool, user.user_id).await {
        Ok(me) => Ok(Some(Viewer::from(&me))),
        Err(AppError::NotFound(_)) => {
            debug!("Visibility filter requested by an unknown or inactive user");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
