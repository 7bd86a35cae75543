//! GeoJSON artifact format.
//!
//! An artifact is a `FeatureCollection` of `Point` features whose
//! `properties` are [`FeatureProperties`]. Keys are
//! `<prefix>/places_<YYYYMMDDTHHMMSSZ>.geojson`, so lexical order is
//! chronological.

use chrono::{DateTime, Utc};
use geo::Coord;
use placesweep_core::{FeatureProperties, PlaceFeature};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type attached to stored artifacts.
pub const CONTENT_TYPE: &str = "application/geo+json";

/// File name prefix of every artifact.
pub const FILE_PREFIX: &str = "places_";

/// File name extension of every artifact.
pub const FILE_EXTENSION: &str = ".geojson";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Errors raised while reading an artifact back.
#[derive(Debug, Error)]
pub enum ArtifactFormatError {
    /// The bytes are not a GeoJSON feature collection of points.
    #[error("artifact is not a valid point feature collection: {0}")]
    Json(#[from] serde_json::Error),
    /// A `type` member held an unexpected value.
    #[error("expected GeoJSON type {expected}, found {found}")]
    UnexpectedType {
        /// Type required at this position.
        expected: &'static str,
        /// Type found in the document.
        found: String,
    },
    /// A feature's `collected_at` is not an RFC 3339 timestamp.
    #[error("feature {place_id} has an invalid collected_at timestamp: {source}")]
    InvalidTimestamp {
        /// Offending feature.
        place_id: String,
        /// Parser error.
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Serialize, Deserialize)]
struct CollectionDoc {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<FeatureDoc>,
}

#[derive(Serialize, Deserialize)]
struct FeatureDoc {
    #[serde(rename = "type")]
    kind: String,
    geometry: PointDoc,
    properties: FeatureProperties,
}

#[derive(Serialize, Deserialize)]
struct PointDoc {
    #[serde(rename = "type")]
    kind: String,
    coordinates: [f64; 2],
}

/// Store key for an artifact written at `at`.
///
/// `attempt` zero yields the plain key; later attempts append `_<attempt>`
/// so a collision within the same second still gets a fresh key.
#[must_use]
pub fn artifact_key(prefix: &str, at: DateTime<Utc>, attempt: u32) -> String {
    let stamp = at.format("%Y%m%dT%H%M%SZ");
    let prefix = prefix.trim_end_matches('/');
    if attempt == 0 {
        format!("{prefix}/{FILE_PREFIX}{stamp}{FILE_EXTENSION}")
    } else {
        format!("{prefix}/{FILE_PREFIX}{stamp}_{attempt}{FILE_EXTENSION}")
    }
}

/// Whether `key` names an artifact under `prefix`.
#[must_use]
pub fn is_artifact_key(prefix: &str, key: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    key.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| {
            !name.contains('/') && name.starts_with(FILE_PREFIX) && name.ends_with(FILE_EXTENSION)
        })
}

/// Serialise features as a GeoJSON feature collection.
pub fn encode_feature_collection(features: &[PlaceFeature]) -> Result<Vec<u8>, serde_json::Error> {
    let document = CollectionDoc {
        kind: "FeatureCollection".to_string(),
        features: features
            .iter()
            .map(|feature| FeatureDoc {
                kind: "Feature".to_string(),
                geometry: PointDoc {
                    kind: "Point".to_string(),
                    coordinates: [feature.location.x, feature.location.y],
                },
                properties: FeatureProperties::from(feature),
            })
            .collect(),
    };
    serde_json::to_vec(&document)
}

/// Parse an artifact back into features, tolerating a leading byte-order
/// mark.
pub fn read_feature_collection(bytes: &[u8]) -> Result<Vec<PlaceFeature>, ArtifactFormatError> {
    let payload = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let document: CollectionDoc = serde_json::from_slice(payload)?;
    expect_type("FeatureCollection", &document.kind)?;
    document.features.into_iter().map(decode_feature).collect()
}

fn decode_feature(doc: FeatureDoc) -> Result<PlaceFeature, ArtifactFormatError> {
    expect_type("Feature", &doc.kind)?;
    expect_type("Point", &doc.geometry.kind)?;
    let [lon, lat] = doc.geometry.coordinates;
    let properties = doc.properties;
    let collected_at = DateTime::parse_from_rfc3339(&properties.collected_at)
        .map_err(|source| ArtifactFormatError::InvalidTimestamp {
            place_id: properties.place_id.clone(),
            source,
        })?
        .with_timezone(&Utc);
    Ok(PlaceFeature {
        place_id: properties.place_id,
        name: properties.name,
        types: properties.types,
        vicinity: properties.vicinity,
        rating: properties.rating,
        user_ratings_total: properties.user_ratings_total,
        plus_code: properties.plus_code,
        collected_at,
        location: Coord { x: lon, y: lat },
    })
}

fn expect_type(expected: &'static str, found: &str) -> Result<(), ArtifactFormatError> {
    if found == expected {
        Ok(())
    } else {
        Err(ArtifactFormatError::UnexpectedType {
            expected,
            found: found.to_owned(),
        })
    }
}
