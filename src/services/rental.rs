//! # Rental Conflict Checker
//!
//! Date validation, conflict detection and pricing for equipment rentals.
//!
//! Date ranges are inclusive on both ends: a rental ending on the day another
//! starts is a conflict. Only `approved` and `active` rentals reserve dates, so
//! any number of overlapping `requested` rentals may coexist until one is approved.

use sqlx::PgConnection;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Inclusive overlap test for two date ranges.
#[inline]
pub fn ranges_overlap(
    start_a: OffsetDateTime,
    end_a: OffsetDateTime,
    start_b: OffsetDateTime,
    end_b: OffsetDateTime,
) -> bool {
    start_a <= end_b && end_a >= start_b
}

/// Rejects ranges that start in the past or end before they start.
pub fn validate_dates(
    start: OffsetDateTime,
    end: OffsetDateTime,
    now: OffsetDateTime,
) -> Result<(), &'static str> {
    if start < now {
        return Err("start date cannot be in the past");
    }
    if end < start {
        return Err("end date cannot be before start date");
    }
    Ok(())
}

/// Number of billable days: whole 24 hour periods plus the starting day.
#[inline]
pub fn rental_days(start: OffsetDateTime, end: OffsetDateTime) -> i64 {
    (end - start).whole_days() + 1
}

#[inline]
pub fn total_price(start: OffsetDateTime, end: OffsetDateTime, daily_rate: f64) -> f64 {
    rental_days(start, end) as f64 * daily_rate
}

/// Returns true if an approved or active rental of the equipment overlaps the range.
///
/// `exclude` skips one rental, used when re-checking a rental that is being approved.
/// Callers that act on the answer must hold the equipment row lock, see
/// [`lock_equipment`].
#[instrument(skip(conn))]
pub async fn has_conflict(
    conn: &mut PgConnection,
    equipment_id: Uuid,
    start: OffsetDateTime,
    end: OffsetDateTime,
    exclude: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let reserved: Vec<(Uuid, OffsetDateTime, OffsetDateTime)> = sqlx::query_as(
        r#"
        SELECT id, start_date, end_date FROM equipment_rentals
        WHERE equipment_id = $1 AND status IN ('approved', 'active')
        "#,
    )
    .bind(equipment_id)
    .fetch_all(conn)
    .await?;

    let conflict = reserved
        .iter()
        .filter(|(id, _, _)| Some(*id) != exclude)
        .any(|(_, reserved_start, reserved_end)| {
            ranges_overlap(start, end, *reserved_start, *reserved_end)
        });

    debug!(conflict, "Rental conflict check finished");
    Ok(conflict)
}

/// Takes a row lock on the equipment for the rest of the transaction.
///
/// Serializes rental requests and approvals for one piece of equipment so the
/// conflict check and the following write see the same reservations.
pub async fn lock_equipment(conn: &mut PgConnection, equipment_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT id FROM equipment WHERE id = $1 FOR UPDATE")
        .bind(equipment_id)
        .fetch_optional(conn)
        .await?;
    Ok(())
}
