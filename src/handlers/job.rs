//! # Job Handlers
//!
//! Job listings and the job lifecycle:
//!
//! 1. An owner posts a job (`open`)
//! 2. Workers apply; the owner accepts one application (`in_progress`)
//! 3. The owner completes the job once insurance is verified (`completed`),
//!    or cancels it at any point before that

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::current_viewer;
use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::models::{AppState, JobApplicationResponse, JobResponse};
use crate::services::job::{
    ApplicationDecisionRequest, ApplyRequest, CompleteJobRequest, CreateJobRequest, JobFilters,
    JobService, UpdateJobRequest,
};

/// Lists jobs newest first.
///
/// GET /api/v1/jobs ?visibility&zip_code&district&category&status&min_price&max_price&filter&page&limit
///
/// With `filter=true` and a bearer token, only listings visible to the caller's
/// zip code or school district are returned.
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthUser>>,
    Query(filters): Query<JobFilters>,
) -> AppResult<Json<Vec<JobResponse>>> {
    let viewer = match filters.filter {
        true => current_viewer(&state, user).await?,
        false => None,
    };
    let jobs = JobService::list(&state.db_pool, filters, viewer.as_ref()).await?;
    debug!(count = jobs.len(), "Jobs listed");
    Ok(Json(jobs))
}

/// GET /api/v1/jobs/{id}
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<JobResponse>> {
    Ok(Json(JobService::get(&state.db_pool, job_id).await?))
}

/// Posts a job.
///
/// POST /api/v1/jobs
///
/// # Returns
///
/// - `201 Created` with the new job
/// - `400 Bad Request` - Missing title or non-positive price
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<impl IntoResponse> {
    let job = JobService::create(
        &state.db_pool,
        state.services.geocoder.as_ref(),
        user.user_id,
        payload,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs/my
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn my_jobs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<JobResponse>>> {
    Ok(Json(JobService::list_mine(&state.db_pool, user.user_id).await?))
}

/// Edits an open job owned by the caller.
///
/// PUT /api/v1/jobs/{id}
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<UpdateJobRequest>,
) -> AppResult<Json<JobResponse>> {
    let job = JobService::update(
        &state.db_pool,
        state.services.geocoder.as_ref(),
        job_id,
        user.user_id,
        payload,
    )
    .await?;
    Ok(Json(job))
}

/// DELETE /api/v1/jobs/{id}
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    JobService::delete(&state.db_pool, job_id, user.user_id).await?;
    Ok(Json(json!({ "message": "job deleted successfully" })))
}

/// Applies to an open job.
///
/// POST /api/v1/jobs/{id}/apply
///
/// # Returns
///
/// - `201 Created` with the pending application
/// - `400 Bad Request` - Own job, job not open, or already applied
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn apply_to_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<ApplyRequest>,
) -> AppResult<impl IntoResponse> {
    let application = JobService::apply(&state.db_pool, job_id, user.user_id, payload).await?;
    info!(application_id = %application.id, "Application submitted");
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /api/v1/jobs/{id}/applications
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn list_applications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<Vec<JobApplicationResponse>>> {
    let applications = JobService::applications(&state.db_pool, job_id, user.user_id).await?;
    Ok(Json(applications))
}

/// Accepts or rejects an application.
///
/// PUT /api/v1/jobs/{id}/applications/{app_id}
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn decide_application(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((job_id, application_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ApplicationDecisionRequest>,
) -> AppResult<Json<JobApplicationResponse>> {
    let application = JobService::decide_application(
        &state.db_pool,
        job_id,
        application_id,
        user.user_id,
        payload.status,
    )
    .await?;
    Ok(Json(application))
}

/// Completes an in-progress job. Sits behind the insurance gate.
///
/// POST /api/v1/jobs/{id}/complete
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn complete_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
    Json(payload): Json<CompleteJobRequest>,
) -> AppResult<Json<JobResponse>> {
    let job = JobService::complete(&state.db_pool, job_id, user.user_id, payload).await?;
    Ok(Json(job))
}

/// POST /api/v1/jobs/{id}/cancel
#[instrument(skip_all, fields(user_id = %user.user_id, request_id = %uuid::Uuid::new_v4()))]
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<JobResponse>> {
    Ok(Json(
        JobService::cancel(&state.db_pool, job_id, user.user_id).await?,
    ))
}
