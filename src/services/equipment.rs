//! # Equipment Service
//!
//! Equipment listings and the rental workflow.
//!
//! Rental requests and approvals both run inside a transaction that first locks the
//! equipment row, then checks for conflicts, then writes. Two overlapping rentals can
//! therefore never both end up approved or active.

use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    Equipment, EquipmentCategory, EquipmentRental, EquipmentResponse, FuelType,
    InvalidTransition, PaginationQuery, PowerType, RentalResponse, RentalStatus, Visibility,
};
use crate::services::geocoding::{Geocoder, ListingLocation, locate};
use crate::services::rental::{has_conflict, lock_equipment, total_price, validate_dates};
use crate::services::user::UserService;
use crate::services::visibility::{self, Viewer};
use crate::utils::validator::sanitize;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEquipmentRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    pub category: EquipmentCategory,
    pub fuel_type: Option<FuelType>,
    pub power_type: Option<PowerType>,
    pub daily_rental_price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub address: String,
    pub visibility: Visibility,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEquipmentRequest {
    pub name: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub category: Option<EquipmentCategory>,
    pub fuel_type: Option<FuelType>,
    pub power_type: Option<PowerType>,
    pub daily_rental_price: Option<f64>,
    pub description: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub address: Option<String>,
    pub visibility: Option<Visibility>,
    pub is_available: Option<bool>,
}

/// Query parameters of `GET /equipment`.
#[derive(Debug, Default, Deserialize)]
pub struct EquipmentFilters {
    pub visibility: Option<Visibility>,
    pub zip_code: Option<String>,
    pub district: Option<String>,
    pub category: Option<EquipmentCategory>,
    pub fuel_type: Option<FuelType>,
    pub power_type: Option<PowerType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Defaults to `true`: unavailable equipment is hidden unless asked for.
    pub is_available: Option<bool>,
    #[serde(default)]
    pub filter: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RentalRequest {
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    #[serde(default)]
    pub pickup_notes: String,
}

#[derive(Debug, Deserialize)]
pub struct RentalStatusRequest {
    pub status: RentalStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRentalRequest {
    #[serde(default)]
    pub return_notes: String,
}

fn validate_daily_price(price: f64) -> AppResult<()> {
    if price <= 0.0 {
        return Err(AppError::BadRequest(
            "daily rental price must be greater than 0",
        ));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| sanitize(&v)).filter(|v| !v.is_empty())
}

fn clean_urls(urls: &[String]) -> Vec<String> {
    urls.iter()
        .map(|url| sanitize(url))
        .filter(|url| !url.is_empty())
        .collect()
}

pub struct EquipmentService;

impl EquipmentService {
    async fn attach_owners(
        pool: &PgPool,
        items: Vec<Equipment>,
    ) -> AppResult<Vec<EquipmentResponse>> {
        let owner_ids: Vec<Uuid> = items.iter().map(|item| item.user_id).collect();
        let owners = UserService::public_profiles(pool, &owner_ids).await?;
        Ok(items
            .into_iter()
            .map(|item| {
                let owner = owners.get(&item.user_id).cloned();
                item.into_response(owner)
            })
            .collect())
    }

    async fn with_owner(pool: &PgPool, item: Equipment) -> AppResult<EquipmentResponse> {
        let owner = UserService::public_profile(pool, item.user_id).await.ok();
        Ok(item.into_response(owner))
    }

    async fn find(pool: &PgPool, equipment_id: Uuid) -> AppResult<Option<Equipment>> {
        Ok(sqlx::query_as("SELECT * FROM equipment WHERE id = $1")
            .bind(equipment_id)
            .fetch_optional(pool)
            .await?)
    }

    async fn owned(
        pool: &PgPool,
        equipment_id: Uuid,
        user_id: Uuid,
        not_found: &'static str,
    ) -> AppResult<Equipment> {
        Self::find(pool, equipment_id)
            .await?
            .filter(|item| item.user_id == user_id)
            .ok_or(AppError::NotFound(not_found))
    }

    async fn rental_responses(
        pool: &PgPool,
        rentals: Vec<EquipmentRental>,
    ) -> AppResult<Vec<RentalResponse>> {
        let mut equipment_ids: Vec<Uuid> = rentals.iter().map(|r| r.equipment_id).collect();
        equipment_ids.sort_unstable();
        equipment_ids.dedup();

        let items: Vec<Equipment> = sqlx::query_as("SELECT * FROM equipment WHERE id = ANY($1)")
            .bind(&equipment_ids)
            .fetch_all(pool)
            .await?;
        let items = Self::attach_owners(pool, items).await?;

        let renter_ids: Vec<Uuid> = rentals.iter().map(|r| r.renter_user_id).collect();
        let renters = UserService::public_profiles(pool, &renter_ids).await?;

        Ok(rentals
            .into_iter()
            .map(|rental| {
                let equipment = items.iter().find(|e| e.id == rental.equipment_id).cloned();
                let renter = renters.get(&rental.renter_user_id).cloned();
                rental.into_response(equipment, renter)
            })
            .collect())
    }

    async fn rental_response(pool: &PgPool, rental: EquipmentRental) -> AppResult<RentalResponse> {
        let mut responses = Self::rental_responses(pool, vec![rental]).await?;
        responses.pop().ok_or(AppError::Internal)
    }

    /// Lists a piece of equipment for rent.
    #[instrument(skip(pool, geocoder, request))]
    pub async fn create(
        pool: &PgPool,
        geocoder: &dyn Geocoder,
        user_id: Uuid,
        request: CreateEquipmentRequest,
    ) -> AppResult<EquipmentResponse> {
        request.validate()?;
        validate_daily_price(request.daily_rental_price)?;

        let owner = UserService::get_active(pool, user_id).await?;
        let address = sanitize(&request.address);
        let location = ListingLocation::resolve(geocoder, &address, &owner).await;

        let item: Equipment = sqlx::query_as(
            r#"
            INSERT INTO equipment (
                user_id, name, make, model, category, fuel_type, power_type,
                daily_rental_price, description, image_urls, address, latitude,
                longitude, zip_code, elementary_school_district_name, visibility
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(sanitize(&request.name))
        .bind(sanitize(&request.make))
        .bind(sanitize(&request.model))
        .bind(request.category)
        .bind(request.fuel_type)
        .bind(request.power_type)
        .bind(request.daily_rental_price)
        .bind(sanitize(&request.description))
        .bind(sqlx::types::Json(clean_urls(&request.image_urls)))
        .bind(&address)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(&location.zip_code)
        .bind(&location.district)
        .bind(request.visibility)
        .fetch_one(pool)
        .await?;

        info!(equipment_id = %item.id, "Equipment listed");
        Ok(item.into_response(Some(owner.public_profile())))
    }

    /// Lists equipment, newest first, hiding unavailable items unless asked.
    ///
    /// Visibility rules are applied after the page is fetched.
    #[instrument(skip(pool, viewer))]
    pub async fn list(
        pool: &PgPool,
        filters: EquipmentFilters,
        viewer: Option<&Viewer>,
    ) -> AppResult<Vec<EquipmentResponse>> {
        let page = PaginationQuery {
            page: filters.page,
            limit: filters.limit,
        }
        .resolve();

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM equipment WHERE is_available = ");
        query.push_bind(filters.is_available.unwrap_or(true));
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
        if let Some(fuel_type) = filters.fuel_type {
            query.push(" AND fuel_type = ").push_bind(fuel_type);
        }
        if let Some(power_type) = filters.power_type {
            query.push(" AND power_type = ").push_bind(power_type);
        }
        if let Some(min_price) = filters.min_price {
            query.push(" AND daily_rental_price >= ").push_bind(min_price);
        }
        if let Some(max_price) = filters.max_price {
            query.push(" AND daily_rental_price <= ").push_bind(max_price);
        }
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items: Vec<Equipment> = query.build_query_as().fetch_all(pool).await?;
        let fetched = items.len();
        let items = visibility::filter(items, viewer, filters.filter);
        debug!(fetched, visible = items.len(), "Equipment listed");

        Self::attach_owners(pool, items).await
    }

    pub async fn get(pool: &PgPool, equipment_id: Uuid) -> AppResult<EquipmentResponse> {
        let item = Self::find(pool, equipment_id)
            .await?
            .ok_or(AppError::NotFound("equipment not found"))?;
        Self::with_owner(pool, item).await
    }

    /// Every listing owned by the user, available or not.
    pub async fn list_mine(pool: &PgPool, user_id: Uuid) -> AppResult<Vec<EquipmentResponse>> {
        let items: Vec<Equipment> =
            sqlx::query_as("SELECT * FROM equipment WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(pool)
                .await?;
        Self::attach_owners(pool, items).await
    }

    /// Edits a listing. Blank fields are left unchanged; an image list, even an
    /// empty one, replaces the stored one.
    #[instrument(skip(pool, geocoder, request))]
    pub async fn update(
        pool: &PgPool,
        geocoder: &dyn Geocoder,
        equipment_id: Uuid,
        user_id: Uuid,
        request: UpdateEquipmentRequest,
    ) -> AppResult<EquipmentResponse> {
        let item = Self::owned(
            pool,
            equipment_id,
            user_id,
            "equipment not found or you don't have permission to update it",
        )
        .await?;
        if let Some(price) = request.daily_rental_price {
            validate_daily_price(price)?;
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
        let image_urls = request
            .image_urls
            .map(|urls| sqlx::types::Json(clean_urls(&urls)));

        let item: Equipment = sqlx::query_as(
            r#"
            UPDATE equipment SET
                name = COALESCE($2, name),
                make = COALESCE($3, make),
                model = COALESCE($4, model),
                category = COALESCE($5, category),
                fuel_type = COALESCE($6, fuel_type),
                power_type = COALESCE($7, power_type),
                daily_rental_price = COALESCE($8, daily_rental_price),
                description = COALESCE($9, description),
                image_urls = COALESCE($10, image_urls),
                address = COALESCE($11, address),
                visibility = COALESCE($12, visibility),
                is_available = COALESCE($13, is_available),
                latitude = COALESCE($14, latitude),
                longitude = COALESCE($15, longitude),
                zip_code = COALESCE($16, zip_code),
                elementary_school_district_name = COALESCE($17, elementary_school_district_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(non_blank(request.name))
        .bind(non_blank(request.make))
        .bind(non_blank(request.model))
        .bind(request.category)
        .bind(request.fuel_type)
        .bind(request.power_type)
        .bind(request.daily_rental_price)
        .bind(non_blank(request.description))
        .bind(image_urls)
        .bind(address)
        .bind(request.visibility)
        .bind(request.is_available)
        .bind(latitude)
        .bind(longitude)
        .bind(zip_code)
        .bind(district)
        .fetch_one(pool)
        .await?;

        info!("Equipment updated");
        Self::with_owner(pool, item).await
    }

    /// Deletes a listing that has no approved or active rentals.
    #[instrument(skip(pool))]
    pub async fn delete(pool: &PgPool, equipment_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let item = Self::owned(
            pool,
            equipment_id,
            user_id,
            "equipment not found or you don't have permission to delete it",
        )
        .await?;

        let mut tx = pool.begin().await?;
        lock_equipment(&mut tx, item.id).await?;
        let reserved: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM equipment_rentals WHERE equipment_id = $1 AND status IN ('approved', 'active'))",
        )
        .bind(item.id)
        .fetch_one(&mut *tx)
        .await?;
        if reserved {
            return Err(AppError::BadRequest(
                "cannot delete equipment with active rentals",
            ));
        }

        sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Equipment deleted");
        Ok(())
    }

    /// Requests a rental of someone else's available equipment.
    ///
    /// # Returns
    ///
    /// * `Ok(RentalResponse)` - The new `requested` rental with its computed price
    /// * `Err(AppError::BadRequest)` - Own equipment, bad dates, or the dates overlap
    ///   an approved or active rental
    /// * `Err(AppError::NotFound)` - Equipment missing or unavailable
    #[instrument(skip(pool, request))]
    pub async fn request_rental(
        pool: &PgPool,
        equipment_id: Uuid,
        user_id: Uuid,
        request: RentalRequest,
    ) -> AppResult<RentalResponse> {
        let mut tx = pool.begin().await?;
        lock_equipment(&mut tx, equipment_id).await?;

        let item: Equipment =
            sqlx::query_as("SELECT * FROM equipment WHERE id = $1 AND is_available = TRUE")
                .bind(equipment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound("equipment not found or not available"))?;

        if item.user_id == user_id {
            return Err(AppError::BadRequest("cannot rent your own equipment"));
        }
        validate_dates(request.start_date, request.end_date, OffsetDateTime::now_utc())
            .map_err(AppError::BadRequest)?;

        if has_conflict(&mut tx, item.id, request.start_date, request.end_date, None).await? {
            debug!("Requested dates overlap a reserved rental");
            return Err(AppError::BadRequest(
                "equipment is not available for the selected dates",
            ));
        }

        let price = total_price(request.start_date, request.end_date, item.daily_rental_price);
        let rental: EquipmentRental = sqlx::query_as(
            r#"
            INSERT INTO equipment_rentals (equipment_id, renter_user_id, start_date, end_date, total_price, pickup_notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(user_id)
        .bind(request.start_date)
        .bind(request.end_date)
        .bind(price)
        .bind(sanitize(&request.pickup_notes))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(rental_id = %rental.id, total_price = price, "Rental requested");
        Self::rental_response(pool, rental).await
    }

    /// Rentals of the owner's equipment, newest first.
    pub async fn rentals(
        pool: &PgPool,
        equipment_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<RentalResponse>> {
        let item = Self::owned(
            pool,
            equipment_id,
            user_id,
            "equipment not found or you don't have permission to view rentals",
        )
        .await?;

        let rentals: Vec<EquipmentRental> = sqlx::query_as(
            "SELECT * FROM equipment_rentals WHERE equipment_id = $1 ORDER BY created_at DESC",
        )
        .bind(item.id)
        .fetch_all(pool)
        .await?;

        Self::rental_responses(pool, rentals).await
    }

    /// Owner decision on a rental: approve a request or cancel it.
    ///
    /// Approval re-checks for conflicts with the equipment locked, excluding the
    /// rental itself.
    #[instrument(skip(pool))]
    pub async fn update_rental_status(
        pool: &PgPool,
        equipment_id: Uuid,
        rental_id: Uuid,
        user_id: Uuid,
        status: RentalStatus,
    ) -> AppResult<RentalResponse> {
        let mut tx = pool.begin().await?;

        let owner_id: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM equipment WHERE id = $1 FOR UPDATE")
                .bind(equipment_id)
                .fetch_optional(&mut *tx)
                .await?;
        if owner_id != Some(user_id) {
            return Err(AppError::NotFound(
                "equipment not found or you don't have permission to update rentals",
            ));
        }

        let rental: EquipmentRental =
            sqlx::query_as("SELECT * FROM equipment_rentals WHERE id = $1 AND equipment_id = $2")
                .bind(rental_id)
                .bind(equipment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AppError::NotFound("rental not found"))?;

        let next = match status {
            RentalStatus::Approved => {
                let next = rental.status.approve()?;
                let conflict = has_conflict(
                    &mut tx,
                    equipment_id,
                    rental.start_date,
                    rental.end_date,
                    Some(rental.id),
                )
                .await?;
                if conflict {
                    warn!("Approval blocked by overlapping reserved rental");
                    return Err(AppError::BadRequest(
                        "equipment is not available for the selected dates",
                    ));
                }
                next
            }
            RentalStatus::Cancelled => rental.status.cancel()?,
            _ => {
                return Err(AppError::BadRequest(
                    "rental status must be approved or cancelled",
                ));
            }
        };

        let rental: EquipmentRental = sqlx::query_as(
            "UPDATE equipment_rentals SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3 RETURNING *",
        )
        .bind(next)
        .bind(rental.id)
        .bind(rental.status)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(InvalidTransition::STALE)?;
        tx.commit().await?;

        info!(%next, "Rental status updated by owner");
        Self::rental_response(pool, rental).await
    }

    /// Loads a rental the user takes part in, as equipment owner or renter.
    async fn participating(
        pool: &PgPool,
        rental_id: Uuid,
        user_id: Uuid,
        denied: &'static str,
    ) -> AppResult<EquipmentRental> {
        let rental: EquipmentRental =
            sqlx::query_as("SELECT * FROM equipment_rentals WHERE id = $1")
                .bind(rental_id)
                .fetch_optional(pool)
                .await?
                .ok_or(AppError::NotFound("rental not found"))?;

        let owner_id: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM equipment WHERE id = $1")
                .bind(rental.equipment_id)
                .fetch_optional(pool)
                .await?;

        if rental.renter_user_id != user_id && owner_id != Some(user_id) {
            return Err(AppError::Forbidden(denied));
        }
        Ok(rental)
    }

    /// Completes an active rental. Either party may complete it.
    #[instrument(skip(pool, request))]
    pub async fn complete_rental(
        pool: &PgPool,
        rental_id: Uuid,
        user_id: Uuid,
        request: CompleteRentalRequest,
    ) -> AppResult<RentalResponse> {
        let rental = Self::participating(
            pool,
            rental_id,
            user_id,
            "you don't have permission to complete this rental",
        )
        .await?;
        let next = rental.status.complete()?;

        let rental: EquipmentRental = sqlx::query_as(
            r#"
            UPDATE equipment_rentals SET status = $1, return_notes = $2, updated_at = NOW()
            WHERE id = $3 AND status = $4
            RETURNING *
            "#,
        )
        .bind(next)
        .bind(sanitize(&request.return_notes))
        .bind(rental.id)
        .bind(rental.status)
        .fetch_optional(pool)
        .await?
        .ok_or(InvalidTransition::STALE)?;

        info!("Rental completed");
        Self::rental_response(pool, rental).await
    }

    /// Cancels a requested or approved rental on behalf of either party.
    #[instrument(skip(pool))]
    pub async fn cancel_rental(
        pool: &PgPool,
        rental_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<RentalResponse> {
        let rental = Self::participating(
            pool,
            rental_id,
            user_id,
            "you don't have permission to cancel this rental",
        )
        .await?;
        let next = rental.status.cancel()?;

        let rental: EquipmentRental = sqlx::query_as(
            "UPDATE equipment_rentals SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3 RETURNING *",
        )
        .bind(next)
        .bind(rental.id)
        .bind(rental.status)
        .fetch_optional(pool)
        .await?
        .ok_or(InvalidTransition::STALE)?;

        info!("Rental cancelled");
        Self::rental_response(pool, rental).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_price_must_be_positive() {
        assert!(validate_daily_price(0.0).is_err());
        assert!(validate_daily_price(30.0).is_ok());
    }

    #[test]
    fn blank_image_urls_are_dropped() {
        let urls = vec![" a.png ".to_string(), "  ".to_string()];
        assert_eq!(clean_urls(&urls), vec!["a.png".to_string()]);
    }

    #[test]
    fn rental_request_parses_rfc3339_dates() {
        let request: RentalRequest = serde_json::from_str(
            r#"{"start_date": "2030-06-01T09:00:00Z", "end_date": "2030-06-03T09:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(request.start_date.day(), 1);
        assert_eq!(request.end_date.day(), 3);
        assert!(request.pickup_notes.is_empty());
    }
}
