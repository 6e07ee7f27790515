use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{UserPublicProfile, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "equipment_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EquipmentCategory {
    Mower,
    WeedWhacker,
    Edger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "fuel_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Gas,
    Electric,
    Battery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "power_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PowerType {
    Corded,
    Cordless,
    Gas,
    Push,
}

#[derive(Debug, Clone, FromRow)]
pub struct Equipment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub make: String,
    pub model: String,
    pub category: EquipmentCategory,
    pub fuel_type: Option<FuelType>,
    pub power_type: Option<PowerType>,
    pub daily_rental_price: f64,
    pub description: String,
    pub image_urls: Json<Vec<String>>,
    pub is_available: bool,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zip_code: String,
    pub elementary_school_district_name: String,
    pub visibility: Visibility,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub make: String,
    pub model: String,
    pub category: EquipmentCategory,
    pub fuel_type: Option<FuelType>,
    pub power_type: Option<PowerType>,
    pub daily_rental_price: f64,
    pub description: String,
    pub image_urls: Vec<String>,
    pub is_available: bool,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zip_code: String,
    pub elementary_school_district_name: String,
    pub visibility: Visibility,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: Option<UserPublicProfile>,
}

impl Equipment {
    pub fn into_response(self, owner: Option<UserPublicProfile>) -> EquipmentResponse {
        EquipmentResponse {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            make: self.make,
            model: self.model,
            category: self.category,
            fuel_type: self.fuel_type,
            power_type: self.power_type,
            daily_rental_price: self.daily_rental_price,
            description: self.description,
            image_urls: self.image_urls.0,
            is_available: self.is_available,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            zip_code: self.zip_code,
            elementary_school_district_name: self.elementary_school_district_name,
            visibility: self.visibility,
            created_at: self.created_at,
            updated_at: self.updated_at,
            user: owner,
        }
    }
}
