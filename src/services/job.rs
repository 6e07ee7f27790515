//! # Job Service
//!
//! Job listings, applications and the job lifecycle.
//!
//! Ownership is always checked before state, so a stranger poking at someone else's
//! job learns nothing about its status. Accepting an application and moving the job
//! to `in_progress` happen in one transaction holding the job row lock.

use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    ApplicationStatus, InvalidTransition, Job, JobApplication, JobApplicationResponse,
    JobCategory, JobResponse, JobStatus, PaginationQuery, Visibility,
};
use crate::services::geocoding::{Geocoder, ListingLocation, locate};
use crate::services::user::UserService;
use crate::services::visibility::{self, Viewer};
use crate::utils::validator::sanitize;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub special_notes: String,
    pub category: JobCategory,
    pub fixed_price: f64,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub address: String,
    pub visibility: Visibility,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_date: Option<OffsetDateTime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub special_notes: Option<String>,
    pub category: Option<JobCategory>,
    pub fixed_price: Option<f64>,
    pub estimated_hours: Option<f64>,
    pub address: Option<String>,
    pub visibility: Option<Visibility>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub scheduled_date: Option<OffsetDateTime>,
}

/// Query parameters of `GET /jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct JobFilters {
    pub visibility: Option<Visibility>,
    pub zip_code: Option<String>,
    pub district: Option<String>,
    pub category: Option<JobCategory>,
    pub status: Option<JobStatus>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Applies the viewer's visibility rules when the caller is authenticated.
    #[serde(default)]
    pub filter: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationDecisionRequest {
    pub status: ApplicationStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteJobRequest {
    #[serde(default)]
    pub completion_image_urls: Vec<String>,
}

fn validate_price(fixed_price: f64) -> AppResult<()> {
    if fixed_price <= 0.0 {
        return Err(AppError::BadRequest("fixed price must be greater than 0"));
    }
    Ok(())
}

fn validate_hours(estimated_hours: f64) -> AppResult<()> {
    if estimated_hours < 0.0 {
        return Err(AppError::BadRequest("estimated hours cannot be negative"));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| sanitize(&v)).filter(|v| !v.is_empty())
}

pub struct JobService;

impl JobService {
    async fn attach_owners(pool: &PgPool, jobs: Vec<Job>) -> AppResult<Vec<JobResponse>> {
        let owner_ids: Vec<Uuid> = jobs.iter().map(|job| job.user_id).collect();
        let owners = UserService::public_profiles(pool, &owner_ids).await?;
        Ok(jobs
            .into_iter()
            .map(|job| {
                let owner = owners.get(&job.user_id).cloned();
                job.into_response(owner)
            })
            .collect())
    }

    async fn with_owner(pool: &PgPool, job: Job) -> AppResult<JobResponse> {
        let owner = UserService::public_profile(pool, job.user_id).await.ok();
        Ok(job.into_response(owner))
    }

    /// Loads a job owned by `user_id`, or fails with `not_found` when it is missing
    /// or belongs to someone else.
    async fn owned(
        pool: &PgPool,
        job_id: Uuid,
        user_id: Uuid,
        not_found: &'static str,
    ) -> AppResult<Job> {
        sqlx::query_as("SELECT * FROM jobs WHERE id = $1 AND user_id = $2")
            .bind(job_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound(not_found))
    }

    /// Posts a new open job.
    ///
    /// # Returns
    ///
    /// * `Ok(JobResponse)` - The job with its owner's public profile
    /// * `Err(AppError::BadRequest)` - Non-positive price or negative hours
    #[instrument(skip(pool, geocoder, request))]
    pub async fn create(
        pool: &PgPool,
        geocoder: &dyn Geocoder,
        user_id: Uuid,
        request: CreateJobRequest,
    ) -> AppResult<JobResponse> {
        request.validate()?;
        validate_price(request.fixed_price)?;
        validate_hours(request.estimated_hours)?;

        let owner = UserService::get_active(pool, user_id).await?;
        let address = sanitize(&request.address);
        let location = ListingLocation::resolve(geocoder, &address, &owner).await;

        let job: Job = sqlx::query_as(
            r#"
            INSERT INTO jobs (
                user_id, title, description, special_notes, category, fixed_price,
                estimated_hours, address, latitude, longitude, zip_code,
                elementary_school_district_name, visibility, scheduled_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(sanitize(&request.title))
        .bind(sanitize(&request.description))
        .bind(sanitize(&request.special_notes))
        .bind(request.category)
        .bind(request.fixed_price)
        .bind(request.estimated_hours)
        .bind(&address)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.zip_code)
        .bind(&location.district)
        .bind(request.visibility)
        .bind(request.scheduled_date)
        .fetch_one(pool)
        .await?;

        info!(job_id = %job.id, "Job created");
        Ok(job.into_response(Some(owner.public_profile())))
    }

    /// Lists jobs newest first, open ones unless `status` asks otherwise.
    ///
    /// Visibility rules are applied after the page is fetched, so a filtered page
    /// may hold fewer than `limit` jobs.
    #[instrument(skip(pool, viewer))]
    pub async fn list(
        pool: &PgPool,
        filters: JobFilters,
        viewer: Option<&Viewer>,
    ) -> AppResult<Vec<JobResponse>> {
        let page = PaginationQuery {
            page: filters.page,
            limit: filters.limit,
        }
        .resolve();

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM jobs WHERE status = ");
        query.push_bind(filters.status.unwrap_or(JobStatus::Open));
        if let Some(visibility) = filters.visibility {
            query.push(" AND visibility = ").push_bind(visibility);
        }
        if let Some(zip_code) = filters.zip_code.filter(|z| !z.is_empty()) {
            query.push(" AND zip_code = ").push_bind(zip_code);
        }
        if let Some(district) = filters.district.filter(|d| !d.is_empty()) {
            query
                .push(" AND elementary_school_district_name = ")
                .push_bind(district);
        }
        if let Some(category) = filters.category {
            query.push(" AND category = ").push_bind(category);
        }
        if let Some(min_price) = filters.min_price {
            query.push(" AND fixed_price >= ").push_bind(min_price);
        }
        if let Some(max_price) = filters.max_price {
            query.push(" AND fixed_price <= ").push_bind(max_price);
        }
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let jobs: Vec<Job> = query.build_query_as().fetch_all(pool).await?;
        let fetched = jobs.len();
        let jobs = visibility::filter(jobs, viewer, filters.filter);
        debug!(fetched, visible = jobs.len(), "Jobs listed");

        Self::attach_owners(pool, jobs).await
    }

    pub async fn get(pool: &PgPool, job_id: Uuid) -> AppResult<JobResponse> {
        let job: Job = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("job not found"))?;
        Self::with_owner(pool, job).await
    }

    /// Every job posted by the user, in any status.
    pub async fn list_mine(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<JobResponse>> {
        let jobs: Vec<Job> =
            sqlx::query_as("SELECT * FROM jobs WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(pool)
                .await?;
        Self::attach_owners(pool, jobs).await
    }

    /// Edits an open job. Blank fields are left unchanged.
    #[instrument(skip(pool, geocoder, request))]
    pub async fn update(
        pool: &PgPool,
        geocoder: &dyn Geocoder,
        job_id: Uuid,
        user_id: Uuid,
        request: UpdateJobRequest,
    ) -> AppResult<JobResponse> {
        let job = Self::owned(
            pool,
            job_id,
            user_id,
            "job not found or you don't have permission to update it",
        )
        .await?;
        if !job.status.is_editable() {
            return Err(AppError::BadRequest("cannot update job that is not open"));
        }
        if let Some(price) = request.fixed_price {
            validate_price(price)?;
        }
        if let Some(hours) = request.estimated_hours {
            validate_hours(hours)?;
        }

        let address = non_blank(request.address);
        let location = match &address {
            Some(address) => locate(geocoder, address).await,
            None => None,
        };
        let (latitude, longitude, zip_code, district) = match location {
            Some(found) => (
                Some(found.latitude),
                Some(found.longitude),
                found.zip_code,
                found.district_name,
            ),
            None => (None, None, None, None),
        };

        let job: Job = sqlx::query_as(
            r#"
            UPDATE jobs SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                special_notes = COALESCE($4, special_notes),
                category = COALESCE($5, category),
                fixed_price = COALESCE($6, fixed_price),
                estimated_hours = COALESCE($7, estimated_hours),
                address = COALESCE($8, address),
                visibility = COALESCE($9, visibility),
                scheduled_date = COALESCE($10, scheduled_date),
                latitude = COALESCE($11, latitude),
                longitude = COALESCE($12, longitude),
                zip_code = COALESCE($13, zip_code),
                elementary_school_district_name = COALESCE($14, elementary_school_district_name),
                updated_at = NOW()
            WHERE id = $1 AND status = $15
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(non_blank(request.title))
        .bind(non_blank(request.description))
        .bind(non_blank(request.special_notes))
        .bind(request.category)
        .bind(request.fixed_price)
        .bind(request.estimated_hours)
        .bind(address)
        .bind(request.visibility)
        .bind(request.scheduled_date)
        .bind(latitude)
        .bind(longitude)
        .bind(zip_code)
        .bind(district)
        .bind(job.status)
        .fetch_optional(pool)
        .await?
        .ok_or(InvalidTransition::STALE)?;

        info!("Job updated");
        Self::with_owner(pool, job).await
    }

    /// Deletes an open job together with its applications.
    #[instrument(skip(pool))]
    pub async fn delete(pool: &PgPool, job_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let job = Self::owned(
            pool,
            job_id,
            user_id,
            "job not found or you don't have permission to delete it",
        )
        .await?;
        if !job.status.is_editable() {
            return Err(AppError::BadRequest("cannot delete job that is not open"));
        }

        let deleted = sqlx::query("DELETE FROM jobs WHERE id = $1 AND status = $2")
            .bind(job.id)
            .bind(job.status)
            .execute(pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(InvalidTransition::STALE.into());
        }
        info!("Job deleted");
        Ok(())
    }

    /// Applies to an open job that belongs to someone else, at most once.
    #[instrument(skip(pool, request))]
    pub async fn apply(
        pool: &PgPool,
        job_id: Uuid,
        user_id: Uuid,
        request: ApplyRequest,
    ) -> AppResult<JobApplicationResponse> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(pool)
            .await?
            .filter(|job| job.status.accepts_applications())
            .ok_or(AppError::NotFound(
                "job not found or not accepting applications",
            ))?;

        if job.user_id == user_id {
            return Err(AppError::BadRequest("cannot apply for your own job"));
        }

        let application: Option<JobApplication> = sqlx::query_as(
            r#"
            INSERT INTO job_applications (job_id, user_id, message)
            VALUES ($1, $2, $3)
            ON CONFLICT (job_id, user_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(user_id)
        .bind(sanitize(&request.message))
        .fetch_optional(pool)
        .await?;

        let Some(application) = application else {
            debug!("Duplicate application rejected");
            return Err(AppError::BadRequest("you have already applied for this job"));
        };

        info!(application_id = %application.id, "Application submitted");
        let applicant = UserService::public_profile(pool, user_id).await.ok();
        Ok(application.into_response(applicant))
    }

    /// Applications for the owner's job, newest first.
    pub async fn applications(
        pool: &PgPool,
        job_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<JobApplicationResponse>> {
        let job = Self::owned(
            pool,
            job_id,
            user_id,
            "job not found or you don't have permission to view applications",
        )
        .await?;

        let applications: Vec<JobApplication> = sqlx::query_as(
            "SELECT * FROM job_applications WHERE job_id = $1 ORDER BY applied_at DESC",
        )
        .bind(job.id)
        .fetch_all(pool)
        .await?;

        let applicant_ids: Vec<Uuid> = applications.iter().map(|a| a.user_id).collect();
        let applicants = UserService::public_profiles(pool, &applicant_ids).await?;
        Ok(applications
            .into_iter()
            .map(|application| {
                let applicant = applicants.get(&application.user_id).cloned();
                application.into_response(applicant)
            })
            .collect())
    }

    /// Accepts or rejects a pending application.
    ///
    /// Accepting moves the job to `in_progress`. A job already in progress stays
    /// there; other applications keep their status.
    #[instrument(skip(pool))]
    pub async fn decide_application(
        pool: &PgPool,
        job_id: Uuid,
        application_id: Uuid,
        user_id: Uuid,
        decision: ApplicationStatus,
    ) -> AppResult<JobApplicationResponse> {
        let mut tx = pool.begin().await?;

        let job: Job = sqlx::query_as("SELECT * FROM jobs WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(job_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound(
                "job not found or you don't have permission to update applications",
            ))?;

        let application: JobApplication =
            sqlx::query_as("SELECT * FROM job_applications WHERE id = $1 AND job_id = $2")
                .bind(application_id)
                .bind(job.id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound("application not found"))?;

        let status = application.status.decide(decision)?;
        let next_job_status = match status {
            ApplicationStatus::Accepted => Some(job.status.on_application_accepted()?),
            _ => None,
        };

        let application: JobApplication = sqlx::query_as(
            "UPDATE job_applications SET status = $1 WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(application.id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(next) = next_job_status.filter(|next| *next != job.status) {
            sqlx::query("UPDATE jobs SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(next)
                .bind(job.id)
                .execute(&mut *tx)
                .await?;
            info!(%next, "Job status advanced by accepted application");
        }

        tx.commit().await?;
        info!(?status, "Application decided");

        let applicant = UserService::public_profile(pool, application.user_id)
            .await
            .ok();
        Ok(application.into_response(applicant))
    }

    /// Marks an in-progress job completed and stores its completion photos.
    #[instrument(skip(pool, request))]
    pub async fn complete(
        pool: &PgPool,
        job_id: Uuid,
        user_id: Uuid,
        request: CompleteJobRequest,
    ) -> AppResult<JobResponse> {
        let job = Self::owned(
            pool,
            job_id,
            user_id,
            "job not found or you don't have permission to complete it",
        )
        .await?;
        let next = job.status.complete()?;

        let image_urls: Vec<String> = request
            .completion_image_urls
            .iter()
            .map(|url| sanitize(url))
            .filter(|url| !url.is_empty())
            .collect();

        let job: Job = sqlx::query_as(
            r#"
            UPDATE jobs SET status = $1, completion_image_urls = $2, updated_at = NOW()
            WHERE id = $3 AND status = $4
            RETURNING *
            "#,
        )
        .bind(next)
        .bind(sqlx::types::Json(image_urls))
        .bind(job.id)
        .bind(job.status)
        .fetch_optional(pool)
        .await?
        .ok_or(InvalidTransition::STALE)?;

        info!("Job completed");
        Self::with_owner(pool, job).await
    }

    /// Cancels an open or in-progress job.
    #[instrument(skip(pool))]
    pub async fn cancel(pool: &PgPool, job_id: Uuid, user_id: Uuid) -> AppResult<JobResponse> {
        let job = Self::owned(
            pool,
            job_id,
            user_id,
            "job not found or you don't have permission to cancel it",
        )
        .await?;
        let next = job.status.cancel()?;

        let job: Job = sqlx::query_as(
            "UPDATE jobs SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3 RETURNING *",
        )
        .bind(next)
        .bind(job.id)
        .bind(job.status)
        .fetch_optional(pool)
        .await?
        .ok_or(InvalidTransition::STALE)?;

        info!("Job cancelled");
        Self::with_owner(pool, job).await
    }
}
