//! # Admin Service
//!
//! Moderation and reporting operations behind the admin key.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{PaginatedResponse, PaginationInfo, PaginationQuery, User, UserResponse};

/// Query parameters of `GET /admin/users`.
#[derive(Debug, Default, Deserialize)]
pub struct AdminUserFilters {
    pub is_active: Option<bool>,
    pub insurance_verified: Option<bool>,
    pub zip_code: Option<String>,
    pub school_district: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Platform-wide counters.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct AdminStats {
    pub total_users: i64,
    pub active_users: i64,
    pub verified_insurance_users: i64,
    pub total_jobs: i64,
    pub open_jobs: i64,
    pub completed_jobs: i64,
    pub total_equipment: i64,
    pub available_equipment: i64,
    pub total_rentals: i64,
    pub active_rentals: i64,
    pub completed_rentals: i64,
    pub total_payments: i64,
    pub successful_payments: i64,
}

/// Appends the user filters as a WHERE clause.
fn push_user_filters(query: &mut QueryBuilder<'_, Postgres>, filters: &AdminUserFilters) {
    query.push(" WHERE TRUE");
    if let Some(is_active) = filters.is_active {
        query.push(" AND is_active = ").push_bind(is_active);
    }
    if let Some(verified) = filters.insurance_verified {
        query.push(" AND insurance_verified = ").push_bind(verified);
    }
    if let Some(zip_code) = filters.zip_code.clone().filter(|z| !z.is_empty()) {
        query.push(" AND zip_code = ").push_bind(zip_code);
    }
    if let Some(district) = filters.school_district.clone().filter(|d| !d.is_empty()) {
        query
            .push(" AND elementary_school_district_name = ")
            .push_bind(district);
    }
}

pub struct AdminService;

impl AdminService {
    pub async fn stats(pool: &PgPool) -> AppResult<AdminStats> {
        let stats = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE is_active) AS active_users,
                (SELECT COUNT(*) FROM users WHERE insurance_verified) AS verified_insurance_users,
                (SELECT COUNT(*) FROM jobs) AS total_jobs,
                (SELECT COUNT(*) FROM jobs WHERE status = 'open') AS open_jobs,
                (SELECT COUNT(*) FROM jobs WHERE status = 'completed') AS completed_jobs,
                (SELECT COUNT(*) FROM equipment) AS total_equipment,
                (SELECT COUNT(*) FROM equipment WHERE is_available) AS available_equipment,
                (SELECT COUNT(*) FROM equipment_rentals) AS total_rentals,
                (SELECT COUNT(*) FROM equipment_rentals WHERE status = 'active') AS active_rentals,
                (SELECT COUNT(*) FROM equipment_rentals WHERE status = 'completed') AS completed_rentals,
                (SELECT COUNT(*) FROM payments) AS total_payments,
                (SELECT COUNT(*) FROM payments WHERE status = 'succeeded') AS successful_payments
            "#,
        )
        .fetch_one(pool)
        .await?;
        Ok(stats)
    }

    /// Lists users newest first, including inactive ones.
    pub async fn users(
        pool: &PgPool,
        filters: AdminUserFilters,
    ) -> AppResult<PaginatedResponse<UserResponse>> {
        let page = PaginationQuery {
            page: filters.page,
            limit: filters.limit,
        }
        .resolve();

        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count, &filters);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM users");
        push_user_filters(&mut query, &filters);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let users: Vec<User> = query.build_query_as().fetch_all(pool).await?;

        Ok(PaginatedResponse {
            data: users.iter().map(User::to_response).collect(),
            pagination: PaginationInfo::new(page, total),
        })
    }

    #[instrument(skip(pool))]
    pub async fn set_active(pool: &PgPool, user_id: Uuid, active: bool) -> AppResult<()> {
        let updated = sqlx::query("UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2")
            .bind(active)
            .bind(user_id)
            .execute(pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(AppError::NotFound("user not found"));
        }
        info!(active, "User activation changed");
        Ok(())
    }

    /// Marks an uploaded insurance document as verified.
    #[instrument(skip(pool))]
    pub async fn verify_insurance(pool: &PgPool, user_id: Uuid) -> AppResult<()> {
        let document: Option<Option<String>> =
            sqlx::query_scalar("SELECT insurance_document_url FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?;

        match document {
            None => return Err(AppError::NotFound("user not found")),
            Some(url) if url.as_deref().is_none_or(str::is_empty) => {
                warn!("Insurance verification without a document");
                return Err(AppError::BadRequest(
                    "user has not uploaded insurance document",
                ));
            }
            Some(_) => {}
        }

        sqlx::query(
            "UPDATE users SET insurance_verified = TRUE, insurance_verified_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        info!("Insurance verified");
        Ok(())
    }

    /// Hard-deletes a job with its applications.
    #[instrument(skip(pool))]
    pub async fn remove_job(pool: &PgPool, job_id: Uuid) -> AppResult<()> {
        let removed = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(pool)
            .await?
            .rows_affected();
        if removed == 0 {
            return Err(AppError::NotFound("job not found"));
        }
        info!("Job removed by admin");
        Ok(())
    }

    /// Hard-deletes equipment that has no approved or active rentals.
    #[instrument(skip(pool))]
    pub async fn remove_equipment(pool: &PgPool, equipment_id: Uuid) -> AppResult<()> {
        let mut tx = pool.begin().await?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM equipment WHERE id = $1 FOR UPDATE")
                .bind(equipment_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("equipment not found"));
        }

        let reserved: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM equipment_rentals WHERE equipment_id = $1 AND status IN ('approved', 'active'))",
        )
        .bind(equipment_id)
        .fetch_one(&mut *tx)
        .await?;
        if reserved {
            return Err(AppError::BadRequest(
                "cannot remove equipment with active rentals",
            ));
        }

        sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(equipment_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Equipment removed by admin");
        Ok(())
    }
}
