use serde::{Deserialize, Serialize};

/// Audience a listing is scoped to.
///
/// Corresponds to the PostgreSQL `visibility_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "visibility_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only viewers living in the same zip code
    #[default]
    ZipCode,
    /// Only viewers in the same elementary school district
    SchoolDistrict,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Visibility::ZipCode => "zip_code",
            Visibility::SchoolDistrict => "school_district",
        };
        write!(f, "{s}")
    }
}
