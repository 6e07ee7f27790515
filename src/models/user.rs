//! # User Types
//!
//! Row type for the `users` table plus the two views handed to clients: the private
//! [`UserResponse`] (self and admin) and the [`UserPublicProfile`] embedded in listings.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elementary_school_district_name: String,
    pub elementary_school_district_code: String,
    pub is_active: bool,
    pub stripe_customer_id: Option<String>,
    pub insurance_document_url: Option<String>,
    pub insurance_verified: bool,
    pub insurance_verified_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Everything about a user except credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elementary_school_district_name: String,
    pub elementary_school_district_code: String,
    pub is_active: bool,
    pub insurance_document_url: Option<String>,
    pub insurance_verified: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub insurance_verified_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// What any visitor may learn about a user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPublicProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub elementary_school_district_name: String,
    pub insurance_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            zip_code: self.zip_code.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            elementary_school_district_name: self.elementary_school_district_name.clone(),
            elementary_school_district_code: self.elementary_school_district_code.clone(),
            is_active: self.is_active,
            insurance_document_url: self.insurance_document_url.clone(),
            insurance_verified: self.insurance_verified,
            insurance_verified_at: self.insurance_verified_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn public_profile(&self) -> UserPublicProfile {
        UserPublicProfile {
            id: self.id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            elementary_school_district_name: self.elementary_school_district_name.clone(),
            insurance_verified: self.insurance_verified,
            created_at: self.created_at,
        }
    }

    /// Returns true if the user may complete jobs and rentals.
    #[inline]
    pub fn can_complete_transactions(&self) -> bool {
        self.insurance_verified
    }
}
