//! # Geo-Visibility Filter
//!
//! Decides which listings a viewer may see. A listing scoped to a zip code is shown
//! to viewers in that zip code; one scoped to a school district is shown to viewers
//! in that district. Viewers never see their own listings while filtering is on.
//!
//! Matching is exact string equality on the stored values. There is no distance math.

use uuid::Uuid;

use crate::models::{Equipment, Job, User, Visibility};

/// A job or equipment listing as seen by the visibility filter.
pub trait Listing {
    fn owner_id(&self) -> Uuid;
    fn visibility(&self) -> Visibility;
    fn zip_code(&self) -> &str;
    fn district(&self) -> &str;
}

/// The location a listing is matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Uuid,
    pub zip_code: String,
    pub district: String,
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            zip_code: user.zip_code.clone(),
            district: user.elementary_school_district_name.clone(),
        }
    }
}

impl Listing for Job {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
    fn visibility(&self) -> Visibility {
        self.visibility
    }
    fn zip_code(&self) -> &str {
        &self.zip_code
    }
    fn district(&self) -> &str {
        &self.elementary_school_district_name
    }
}

impl Listing for Equipment {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
    fn visibility(&self) -> Visibility {
        self.visibility
    }
    fn zip_code(&self) -> &str {
        &self.zip_code
    }
    fn district(&self) -> &str {
        &self.elementary_school_district_name
    }
}

/// Returns true if `viewer` falls inside the listing's audience.
///
/// An empty location on the viewer side never matches.
pub fn is_visible_to<L: Listing>(listing: &L, viewer: &Viewer) -> bool {
    if listing.owner_id() == viewer.user_id {
        return false;
    }
    match listing.visibility() {
        Visibility::ZipCode => !viewer.zip_code.is_empty() && listing.zip_code() == viewer.zip_code,
        Visibility::SchoolDistrict => {
            !viewer.district.is_empty() && listing.district() == viewer.district
        }
    }
}

/// Applies visibility rules to a fetched page of listings.
///
/// With filtering disabled, or no viewer, the input is returned unchanged.
pub fn filter<L: Listing>(listings: Vec<L>, viewer: Option<&Viewer>, enabled: bool) -> Vec<L> {
    match viewer {
        Some(viewer) if enabled => listings
            .into_iter()
            .filter(|listing| is_visible_to(listing, viewer))
            .collect(),
        _ => listings,
    }
}
