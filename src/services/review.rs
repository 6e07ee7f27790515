//! # Review Service
//!
//! Reviews left between the two parties of a completed job or rental.

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{JobStatus, RentalStatus, Review, ReviewResponse, ReviewType};
use crate::services::user::UserService;
use crate::utils::validator::{sanitize, validate_rating};

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub reviewed_user_id: Uuid,
    pub job_id: Option<Uuid>,
    pub equipment_rental_id: Option<Uuid>,
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
}

/// What a review is attached to. Exactly one of the two ids must be given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Job(Uuid),
    Rental(Uuid),
}

impl Subject {
    fn from_request(request: &CreateReviewRequest) -> AppResult<Self> {
        match (request.job_id, request.equipment_rental_id) {
            (Some(job_id), None) => Ok(Subject::Job(job_id)),
            (None, Some(rental_id)) => Ok(Subject::Rental(rental_id)),
            _ => Err(AppError::BadRequest(
                "exactly one of job_id or equipment_rental_id is required",
            )),
        }
    }

    fn review_type(&self) -> ReviewType {
        match self {
            Subject::Job(_) => ReviewType::JobCompletion,
            Subject::Rental(_) => ReviewType::EquipmentRental,
        }
    }
}

/// Both users must be the two distinct parties of the transaction.
fn parties_match(parties: (Uuid, Option<Uuid>), reviewer: Uuid, reviewed: Uuid) -> bool {
    let (first, second) = parties;
    let Some(second) = second else {
        return false;
    };
    (reviewer == first && reviewed == second) || (reviewer == second && reviewed == first)
}

pub struct ReviewService;

impl ReviewService {
    /// Owner of a completed job, and whichever of the two users is not the owner
    /// if that user had an accepted application.
    async fn job_parties(
        pool: &PgPool,
        job_id: Uuid,
        reviewer_id: Uuid,
        reviewed_id: Uuid,
    ) -> AppResult<(Uuid, Option<Uuid>)> {
        let row: Option<(Uuid, JobStatus)> =
            sqlx::query_as("SELECT user_id, status FROM jobs WHERE id = $1")
                .bind(job_id)
                .fetch_optional(pool)
                .await?;
        let (owner_id, status) = row.ok_or(AppError::NotFound("job not found"))?;
        if status != JobStatus::Completed {
            return Err(AppError::BadRequest("can only review completed jobs"));
        }

        let other_id = if reviewer_id == owner_id {
            reviewed_id
        } else {
            reviewer_id
        };
        let worker_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM job_applications WHERE job_id = $1 AND user_id = $2 AND status = 'accepted'",
        )
        .bind(job_id)
        .bind(other_id)
        .fetch_optional(pool)
        .await?;
        Ok((owner_id, worker_id))
    }

    /// Equipment owner and renter of a completed rental.
    async fn rental_parties(pool: &PgPool, rental_id: Uuid) -> AppResult<(Uuid, Option<Uuid>)> {
        let row: Option<(Uuid, Uuid, RentalStatus)> = sqlx::query_as(
            r#"
            SELECT e.user_id, r.renter_user_id, r.status
            FROM equipment_rentals r
            JOIN equipment e ON e.id = r.equipment_id
            WHERE r.id = $1
            "#,
        )
        .bind(rental_id)
        .fetch_optional(pool)
        .await?;
        let (owner_id, renter_id, status) = row.ok_or(AppError::NotFound("rental not found"))?;
        if status != RentalStatus::Completed {
            return Err(AppError::BadRequest("can only review completed rentals"));
        }
        Ok((owner_id, Some(renter_id)))
    }

    /// Records a review by one party of a completed job or rental about the other.
    ///
    /// # Returns
    ///
    /// * `Ok(ReviewResponse)` - The stored review with the reviewer's profile
    /// * `Err(AppError::BadRequest)` - Bad rating, self review, unfinished transaction,
    ///   or a repeated review
    /// * `Err(AppError::Forbidden)` - The two users are not the parties involved
    #[instrument(skip(pool, request), fields(reviewed_user_id = %request.reviewed_user_id))]
    pub async fn create(
        pool: &PgPool,
        reviewer_id: Uuid,
        request: CreateReviewRequest,
    ) -> AppResult<ReviewResponse> {
        validate_rating(request.rating)
            .map_err(|_| AppError::BadRequest("rating must be between 1 and 5"))?;
        if request.reviewed_user_id == reviewer_id {
            return Err(AppError::BadRequest("you cannot review yourself"));
        }
        let subject = Subject::from_request(&request)?;

        let parties = match subject {
            Subject::Job(job_id) => {
                Self::job_parties(pool, job_id, reviewer_id, request.reviewed_user_id).await?
            }
            Subject::Rental(rental_id) => Self::rental_parties(pool, rental_id).await?,
        };
        if !parties_match(parties, reviewer_id, request.reviewed_user_id) {
            debug!(?subject, "Reviewer is not a party of the transaction");
            return Err(AppError::Forbidden(
                "you can only review the other party of your own completed transactions",
            ));
        }

        let (job_id, rental_id) = match subject {
            Subject::Job(id) => (Some(id), None),
            Subject::Rental(id) => (None, Some(id)),
        };

        let review: Review = sqlx::query_as(
            r#"
            INSERT INTO reviews (reviewer_user_id, reviewed_user_id, job_id, equipment_rental_id, rating, comment, type)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(reviewer_id)
        .bind(request.reviewed_user_id)
        .bind(job_id)
        .bind(rental_id)
        .bind(request.rating)
        .bind(sanitize(&request.comment))
        .bind(subject.review_type())
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            // one review per reviewer and transaction, enforced by unique indexes
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                debug!("Repeated review rejected");
                AppError::BadRequest("you have already reviewed this transaction")
            }
            e => e.into(),
        })?;

        info!(review_id = %review.id, rating = review.rating, "Review created");
        let reviewer = UserService::public_profile(pool, reviewer_id).await.ok();
        Ok(review.into_response(reviewer))
    }

    /// Reviews received by a user, newest first.
    pub async fn for_user(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<ReviewResponse>> {
        let reviews: Vec<Review> = sqlx::query_as(
            "SELECT * FROM reviews WHERE reviewed_user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let reviewer_ids: Vec<Uuid> = reviews.iter().map(|r| r.reviewer_user_id).collect();
        let reviewers = UserService::public_profiles(pool, &reviewer_ids).await?;
        Ok(reviews
            .into_iter()
            .map(|review| {
                let reviewer = reviewers.get(&review.reviewer_user_id).cloned();
                review.into_response(reviewer)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(job_id: Option<Uuid>, rental_id: Option<Uuid>) -> CreateReviewRequest {
        CreateReviewRequest {
            reviewed_user_id: Uuid::new_v4(),
            job_id,
            equipment_rental_id: rental_id,
            rating: 5,
            comment: String::new(),
        }
    }

    #[test]
    fn subject_requires_exactly_one_target() {
        let id = Uuid::new_v4();
        assert_eq!(
            Subject::from_request(&request(Some(id), None)).unwrap(),
            Subject::Job(id)
        );
        assert_eq!(
            Subject::from_request(&request(None, Some(id))).unwrap(),
            Subject::Rental(id)
        );
        assert!(Subject::from_request(&request(None, None)).is_err());
        assert!(Subject::from_request(&request(Some(id), Some(id))).is_err());
    }

    #[test]
    fn either_party_may_review_the_other() {
        let owner = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        assert!(parties_match((owner, Some(worker)), owner, worker));
        assert!(parties_match((owner, Some(worker)), worker, owner));
        assert!(!parties_match((owner, Some(worker)), stranger, owner));
        assert!(!parties_match((owner, Some(worker)), owner, stranger));
        assert!(!parties_match((owner, None), owner, worker));
    }
}
