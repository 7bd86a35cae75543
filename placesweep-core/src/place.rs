//! Place records as returned by the search provider and as persisted.

use chrono::{DateTime, SecondsFormat, Utc};
use geo::Coord;
use serde::{Deserialize, Serialize};

/// A search result exactly as the provider describes it.
///
/// Every field is optional; unknown members are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPlace {
    /// Provider identifier, used as the deduplication key.
    pub place_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Category tags, e.g. `["cafe", "food"]`.
    pub types: Option<Vec<String>>,
    /// Short address near the place.
    pub vicinity: Option<String>,
    /// Full formatted address.
    pub formatted_address: Option<String>,
    /// Average user rating.
    pub rating: Option<f64>,
    /// Number of user ratings behind [`RawPlace::rating`].
    pub user_ratings_total: Option<u64>,
    /// Geometry block holding the place location.
    pub geometry: Option<RawGeometry>,
    /// Open Location Code block.
    pub plus_code: Option<RawPlusCode>,
}

/// Geometry member of a [`RawPlace`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawGeometry {
    /// Point location.
    pub location: Option<RawLocation>,
}

/// Latitude/longitude pair reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RawLocation {
    /// Latitude in degrees.
    pub lat: Option<f64>,
    /// Longitude in degrees.
    pub lng: Option<f64>,
}

/// Plus-code member of a [`RawPlace`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPlusCode {
    /// Globally unique plus code.
    pub global_code: Option<String>,
}

impl RawPlace {
    /// Resolved location, when both ordinates are present and finite.
    #[must_use]
    pub fn location(&self) -> Option<Coord<f64>> {
        let location = self.geometry.as_ref()?.location?;
        let lat = location.lat.filter(|v| v.is_finite())?;
        let lng = location.lng.filter(|v| v.is_finite())?;
        Some(Coord { x: lng, y: lat })
    }
}

/// The deduplicated, durable record produced for one place.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceFeature {
    /// Provider identifier; unique within a run.
    pub place_id: String,
    /// Display name.
    pub name: Option<String>,
    /// Category tags.
    pub types: Option<Vec<String>>,
    /// Short address, falling back to the formatted address.
    pub vicinity: Option<String>,
    /// Average user rating.
    pub rating: Option<f64>,
    /// Number of user ratings.
    pub user_ratings_total: Option<u64>,
    /// Global plus code.
    pub plus_code: Option<String>,
    /// When the record was assembled.
    pub collected_at: DateTime<Utc>,
    /// Location with `x = longitude`, `y = latitude`.
    pub location: Coord<f64>,
}

/// Serialised attributes of a [`PlaceFeature`].
///
/// Shared by the GeoJSON artifact (`properties`) and warehouse rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    /// Provider identifier.
    pub place_id: String,
    /// Display name.
    pub name: Option<String>,
    /// Category tags.
    pub types: Option<Vec<String>>,
    /// Short address.
    pub vicinity: Option<String>,
    /// Average user rating.
    pub rating: Option<f64>,
    /// Number of user ratings.
    pub user_ratings_total: Option<u64>,
    /// Global plus code.
    pub plus_code: Option<String>,
    /// Assembly time, RFC 3339 in UTC with a trailing `Z`.
    pub collected_at: String,
}

impl From<&PlaceFeature> for FeatureProperties {
    fn from(feature: &PlaceFeature) -> Self {
        Self {
            place_id: feature.place_id.clone(),
            name: feature.name.clone(),
            types: feature.types.clone(),
            vicinity: feature.vicinity.clone(),
            rating: feature.rating,
            user_ratings_total: feature.user_ratings_total,
            plus_code: feature.plus_code.clone(),
            collected_at: format_timestamp(feature.collected_at),
        }
    }
}

/// Format a timestamp as RFC 3339 UTC with microseconds and a `Z` suffix.
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use placesweep_core::format_timestamp;
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
/// assert_eq!(format_timestamp(at), "2024-03-01T09:30:00.000000Z");
/// ```
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Map a provider record onto a canonical feature stamped with `collected_at`.
///
/// Returns `None` when the record has no usable location or no place id.
/// The short vicinity wins over the formatted address; other optional fields
/// are carried through untouched.
#[must_use]
pub fn assemble(raw: &RawPlace, collected_at: DateTime<Utc>) -> Option<PlaceFeature> {
    let location = raw.location()?;
    let place_id = raw.place_id.clone()?;
    Some(PlaceFeature {
        place_id,
        name: raw.name.clone(),
        types: raw.types.clone(),
        vicinity: raw
            .vicinity
            .clone()
            .or_else(|| raw.formatted_address.clone()),
        rating: raw.rating,
        user_ratings_total: raw.user_ratings_total,
        plus_code: raw
            .plus_code
            .as_ref()
            .and_then(|code| code.global_code.clone()),
        collected_at,
        location,
    })
}

/// [`assemble`] stamped with the current time.
#[must_use]
pub fn assemble_now(raw: &RawPlace) -> Option<PlaceFeature> {
    assemble(raw, Utc::now())
}
