//! # Equipment Rental Types
//!
//! ## Status Flow
//!
//! ```text
//! requested ──(owner approves)──> approved ──(payment succeeds)──> active ──(owner or renter)──> completed
//!     └────────(owner or renter cancels)───┴──> cancelled
//! ```
//!
//! Only `approved` and `active` rentals reserve the equipment's dates.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{EquipmentResponse, InvalidTransition, UserPublicProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "rental_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Requested,
    Approved,
    Active,
    Completed,
    Cancelled,
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            RentalStatus::Requested => "requested",
            RentalStatus::Approved => "approved",
            RentalStatus::Active => "active",
            RentalStatus::Completed => "completed",
            RentalStatus::Cancelled => "cancelled",
        };
        write!(f, "{status_str}")
    }
}

impl RentalStatus {
    /// Statuses whose date range is reserved against other rentals.
    pub const RESERVING: [RentalStatus; 2] = [RentalStatus::Approved, RentalStatus::Active];

    /// Returns true if this rental blocks its dates for other renters.
    #[inline]
    pub fn reserves_dates(&self) -> bool {
        Self::RESERVING.contains(self)
    }

    pub fn approve(self) -> Result<RentalStatus, InvalidTransition> {
        match self {
            RentalStatus::Requested => Ok(RentalStatus::Approved),
            _ => Err(InvalidTransition("can only approve requested rentals")),
        }
    }

    /// Triggered by a succeeded payment.
    pub fn activate(self) -> Result<RentalStatus, InvalidTransition> {
        match self {
            RentalStatus::Approved => Ok(RentalStatus::Active),
            _ => Err(InvalidTransition("rental must be approved to activate")),
        }
    }

    pub fn complete(self) -> Result<RentalStatus, InvalidTransition> {
        match self {
            RentalStatus::Active => Ok(RentalStatus::Completed),
            _ => Err(InvalidTransition("rental must be active to complete")),
        }
    }

    pub fn cancel(self) -> Result<RentalStatus, InvalidTransition> {
        match self {
            RentalStatus::Requested | RentalStatus::Approved => Ok(RentalStatus::Cancelled),
            _ => Err(InvalidTransition(
                "can only cancel requested or approved rentals",
            )),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EquipmentRental {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub renter_user_id: Uuid,
    pub start_date: OffsetDateTime,
    pub end_date: OffsetDateTime,
    pub total_price: f64,
    pub status: RentalStatus,
    pub pickup_notes: String,
    pub return_notes: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentalResponse {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub renter_user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    pub total_price: f64,
    pub status: RentalStatus,
    pub pickup_notes: String,
    pub return_notes: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub equipment: Option<EquipmentResponse>,
    pub renter: Option<UserPublicProfile>,
}

impl EquipmentRental {
    pub fn into_response(
        self,
        equipment: Option<EquipmentResponse>,
        renter: Option<UserPublicProfile>,
    ) -> RentalResponse {
        RentalResponse {
            id: self.id,
            equipment_id: self.equipment_id,
            renter_user_id: self.renter_user_id,
            start_date: self.start_date,
            end_date: self.end_date,
            total_price: self.total_price,
            status: self.status,
            pickup_notes: self.pickup_notes,
            return_notes: self.return_notes,
            created_at: self.created_at,
            equipment,
            renter,
        }
    }
}
