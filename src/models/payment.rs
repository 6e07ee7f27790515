use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    JobPayment,
    EquipmentRental,
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentType::JobPayment => "job_payment",
            PaymentType::EquipmentRental => "equipment_rental",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

/// What a payment pays for.
///
/// Persisted as the `type` and `related_id` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    /// Owner paying the worker for a completed job
    Job(Uuid),
    /// Renter paying for an approved rental
    Rental(Uuid),
}

impl PaymentTarget {
    pub fn new(payment_type: PaymentType, related_id: Uuid) -> Self {
        match payment_type {
            PaymentType::JobPayment => PaymentTarget::Job(related_id),
            PaymentType::EquipmentRental => PaymentTarget::Rental(related_id),
        }
    }

    pub fn payment_type(&self) -> PaymentType {
        match self {
            PaymentTarget::Job(_) => PaymentType::JobPayment,
            PaymentTarget::Rental(_) => PaymentType::EquipmentRental,
        }
    }

    pub fn related_id(&self) -> Uuid {
        match self {
            PaymentTarget::Job(id) | PaymentTarget::Rental(id) => *id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_payment_intent_id: String,
    pub amount: f64,
    pub currency: String,
    #[sqlx(rename = "type")]
    pub payment_type: PaymentType,
    pub related_id: Uuid,
    pub status: PaymentStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Payment {
    #[inline]
    pub fn target(&self) -> PaymentTarget {
        PaymentTarget::new(self.payment_type, self.related_id)
    }

    pub fn to_response(&self) -> PaymentResponse {
        PaymentResponse {
            id: self.id,
            user_id: self.user_id,
            stripe_payment_intent_id: self.stripe_payment_intent_id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            payment_type: self.payment_type,
            related_id: self.related_id,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_payment_intent_id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    pub related_id: Uuid,
    pub status: PaymentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
