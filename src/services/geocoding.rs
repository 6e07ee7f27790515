//! # Geocoding Service
//!
//! Resolves a street address into coordinates, a zip code and an elementary school
//! district. Listing and profile flows treat every failure here as a warning: the
//! record is saved without the geocoded fields.
//!
//! ## Implementations
//!
//! - [`GeocodioGeocoder`] - Production implementation backed by the Geocodio HTTP API
//! - [`NoopGeocoder`] - Used when no API key is configured; always reports `Disabled`

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::models::User;
use crate::utils::constant::GEOCODER_TIMEOUT;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding is not configured")]
    Disabled,
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geocoding API returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("no geocoding results found for address")]
    NoResults,
}

/// Location details for one address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub zip_code: Option<String>,
    pub district_name: Option<String>,
    pub district_code: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Looks up a free-form address.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the service is disabled, unreachable, or has no match.
    async fn geocode(&self, address: &str) -> Result<GeocodeResult, GeocodeError>;
}

/// Geocodes `address`, downgrading every failure to a warning.
///
/// Returns `None` for a blank address or when the lookup fails.
pub async fn locate(geocoder: &dyn Geocoder, address: &str) -> Option<GeocodeResult> {
    if address.trim().is_empty() {
        return None;
    }
    match geocoder.geocode(address).await {
        Ok(result) => Some(result),
        Err(GeocodeError::Disabled) => None,
        Err(e) => {
            warn!(error = %e, "Failed to geocode address");
            None
        }
    }
}

/// Location columns stored on a job or equipment listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zip_code: String,
    pub district: String,
}

impl ListingLocation {
    pub fn of_user(user: &User) -> Self {
        Self {
            latitude: user.latitude,
            longitude: user.longitude,
            zip_code: user.zip_code.clone(),
            district: user.elementary_school_district_name.clone(),
        }
    }

    /// Location for a new listing.
    ///
    /// The geocoded address when there is one, otherwise the owner's stored
    /// location. A failed lookup also falls back to the owner.
    pub async fn resolve(geocoder: &dyn Geocoder, address: &str, owner: &User) -> Self {
        if address.trim().is_empty() {
            return Self::of_user(owner);
        }
        locate(geocoder, address)
            .await
            .map(Self::from)
            .unwrap_or_else(|| Self::of_user(owner))
    }
}

impl From<GeocodeResult> for ListingLocation {
    fn from(result: GeocodeResult) -> Self {
        Self {
            latitude: Some(result.latitude),
            longitude: Some(result.longitude),
            zip_code: result.zip_code.unwrap_or_default(),
            district: result.district_name.unwrap_or_default(),
        }
    }
}

/// Geocoder used when no API key is configured.
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn geocode(&self, _address: &str) -> Result<GeocodeResult, GeocodeError> {
        debug!("Geocoding skipped, no geocoder configured");
        Err(GeocodeError::Disabled)
    }
}

#[derive(Debug, Deserialize)]
struct GeocodioResponse {
    #[serde(default)]
    results: Vec<GeocodioResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodioResult {
    location: GeocodioLocation,
    #[serde(default)]
    address_components: GeocodioAddressComponents,
    #[serde(default)]
    fields: GeocodioFields,
}

#[derive(Debug, Deserialize)]
struct GeocodioLocation {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Default, Deserialize)]
struct GeocodioAddressComponents {
    zip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeocodioFields {
    school_districts: Option<GeocodioSchoolDistricts>,
}

#[derive(Debug, Default, Deserialize)]
struct GeocodioSchoolDistricts {
    #[serde(default)]
    elementary: Vec<GeocodioDistrict>,
}

#[derive(Debug, Deserialize)]
struct GeocodioDistrict {
    name: String,
    lea_code: Option<String>,
}

impl From<GeocodioResult> for GeocodeResult {
    fn from(result: GeocodioResult) -> Self {
        let district = result
            .fields
            .school_districts
            .and_then(|districts| districts.elementary.into_iter().next());

        GeocodeResult {
            latitude: result.location.lat,
            longitude: result.location.lng,
            zip_code: result.address_components.zip.filter(|zip| !zip.is_empty()),
            district_name: district.as_ref().map(|d| d.name.clone()),
            district_code: district.and_then(|d| d.lea_code),
        }
    }
}

/// Geocodio backed geocoder for production use
pub struct GeocodioGeocoder {
    api_key: SecretString,
    base_url: String,
    http_client: reqwest::Client,
}

impl GeocodioGeocoder {
    pub fn new(api_key: SecretString, base_url: String) -> Result<Self, reqwest::Error> {
        info!(%base_url, "Initializing Geocodio geocoder");
        let http_client = reqwest::Client::builder()
            .timeout(GEOCODER_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key,
            base_url,
            http_client,
        })
    }
}

#[async_trait]
impl Geocoder for GeocodioGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        let response = self
            .http_client
            .get(format!("{}/geocode", self.base_url))
            .query(&[
                ("q", address),
                ("api_key", self.api_key.expose_secret()),
                ("fields", "school_districts"),
            ])
            .send()
            .await
            .inspect_err(|e| error!(error = %e, "Network request to geocoding API failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response body".to_string());
            error!(%status, %body, "Geocoding API returned error");
            return Err(GeocodeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GeocodioResponse = response.json().await?;
        let result = parsed
            .results
            .into_iter()
            .next()
            .ok_or(GeocodeError::NoResults)?;

        debug!("Address geocoded");
        Ok(result.into())
    }
}
