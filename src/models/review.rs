use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::UserPublicProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "review_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    JobCompletion,
    EquipmentRental,
}

#[derive(Debug, Clone, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub reviewer_user_id: Uuid,
    pub reviewed_user_id: Uuid,
    pub job_id: Option<Uuid>,
    pub equipment_rental_id: Option<Uuid>,
    pub rating: i16,
    pub comment: String,
    #[sqlx(rename = "type")]
    pub review_type: ReviewType,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub reviewer_user_id: Uuid,
    pub reviewed_user_id: Uuid,
    pub job_id: Option<Uuid>,
    pub equipment_rental_id: Option<Uuid>,
    pub rating: i16,
    pub comment: String,
    #[serde(rename = "type")]
    pub review_type: ReviewType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub reviewer: Option<UserPublicProfile>,
}

impl Review {
    pub fn into_response(self, reviewer: Option<UserPublicProfile>) -> ReviewResponse {
        ReviewResponse {
            id: self.id,
            reviewer_user_id: self.reviewer_user_id,
            reviewed_user_id: self.reviewed_user_id,
            job_id: self.job_id,
            equipment_rental_id: self.equipment_rental_id,
            rating: self.rating,
            comment: self.comment,
            review_type: self.review_type,
            created_at: self.created_at,
            reviewer,
        }
    }
}
