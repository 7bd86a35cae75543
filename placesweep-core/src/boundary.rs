//! Boundary polygons resolved from GeoJSON documents.
//!
//! A run samples exactly one boundary. Documents may be a bare geometry, a
//! `Feature`, or a `FeatureCollection`; collections contribute the geometry of
//! their first feature. Only `Polygon` and `MultiPolygon` geometries describe
//! an area worth sampling.

use geo::{BoundingRect, Coord, Intersects, LineString, MultiPolygon, Point, Polygon, Rect};
use serde_json::Value;
use thiserror::Error;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Errors raised while resolving a boundary from a GeoJSON document.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The document bytes were not valid JSON.
    #[error("boundary document is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    /// No geometry could be resolved from the document.
    #[error("boundary document does not contain a geometry")]
    MissingGeometry,
    /// The resolved geometry does not describe an area.
    #[error("unsupported boundary geometry type {kind:?}; expected Polygon or MultiPolygon")]
    UnsupportedType {
        /// Geometry type found in the document.
        kind: String,
    },
    /// The coordinate arrays could not be interpreted.
    #[error("malformed {kind} coordinates: {reason}")]
    MalformedCoordinates {
        /// Geometry type being decoded.
        kind: &'static str,
        /// Description of the defect.
        reason: String,
    },
    /// The geometry contained no polygons.
    #[error("boundary geometry is empty")]
    Empty,
}

/// An immutable sampling boundary with a precomputed bounding box.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use placesweep_core::Boundary;
/// use serde_json::json;
///
/// # fn main() -> Result<(), placesweep_core::GeometryError> {
/// let boundary = Boundary::from_geojson(&json!({
///     "type": "Polygon",
///     "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
/// }))?;
/// assert!(boundary.covers(Coord { x: 1.0, y: 0.5 }));
/// assert!(!boundary.covers(Coord { x: 1.5, y: 0.5 }));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    shape: MultiPolygon<f64>,
    bounds: Rect<f64>,
}

impl Boundary {
    /// Build a boundary from a single polygon.
    pub fn from_polygon(polygon: Polygon<f64>) -> Result<Self, GeometryError> {
        Self::from_multi_polygon(MultiPolygon::new(vec![polygon]))
    }

    /// Build a boundary from a set of polygons.
    pub fn from_multi_polygon(shape: MultiPolygon<f64>) -> Result<Self, GeometryError> {
        let bounds = shape.bounding_rect().ok_or(GeometryError::Empty)?;
        Ok(Self { shape, bounds })
    }

    /// Decode a boundary from raw JSON bytes, ignoring a leading byte-order mark.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, GeometryError> {
        let payload = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let document: Value = serde_json::from_slice(payload).map_err(GeometryError::Json)?;
        Self::from_geojson(&document)
    }

    /// Resolve a boundary from a decoded GeoJSON document.
    pub fn from_geojson(document: &Value) -> Result<Self, GeometryError> {
        let geometry = resolve_geometry(document)?;
        let kind = geometry.get("type").and_then(Value::as_str);
        let shape = match kind {
            Some("Polygon") => MultiPolygon::new(vec![parse_polygon(
                coordinates(geometry, "Polygon")?,
                "Polygon",
            )?]),
            Some("MultiPolygon") => parse_multi_polygon(coordinates(geometry, "MultiPolygon")?)?,
            other => {
                return Err(GeometryError::UnsupportedType {
                    kind: other.unwrap_or("<missing>").to_owned(),
                });
            }
        };
        Self::from_multi_polygon(shape)
    }

    /// Bounding box of every polygon in the boundary.
    #[must_use]
    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    /// Underlying polygons.
    #[must_use]
    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    /// Boundary-inclusive containment test.
    ///
    /// Points on an edge or vertex count as inside; points inside a hole do
    /// not.
    #[must_use]
    pub fn covers(&self, coord: Coord<f64>) -> bool {
        if !(coord.x.is_finite() && coord.y.is_finite()) {
            return false;
        }
        let point = Point::from(coord);
        // `Intersects` reports boundary points as intersecting.
        self.shape.0.iter().any(|polygon| polygon.intersects(&point))
    }
}

fn resolve_geometry(document: &Value) -> Result<&Value, GeometryError> {
    let geometry = match document.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => document
            .get("features")
            .and_then(Value::as_array)
            .and_then(|features| features.first())
            .and_then(|feature| feature.get("geometry")),
        Some("Feature") => document.get("geometry"),
        _ => Some(document),
    };
    geometry
        .filter(|value| value.is_object())
        .ok_or(GeometryError::MissingGeometry)
}

fn coordinates<'a>(geometry: &'a Value, kind: &'static str) -> Result<&'a Value, GeometryError> {
    geometry
        .get("coordinates")
        .ok_or_else(|| GeometryError::MalformedCoordinates {
            kind,
            reason: "missing coordinates member".to_owned(),
        })
}

fn parse_multi_polygon(value: &Value) -> Result<MultiPolygon<f64>, GeometryError> {
    let polygons = as_array(value, "MultiPolygon", "expected an array of polygons")?;
    if polygons.is_empty() {
        return Err(GeometryError::Empty);
    }
    polygons
        .iter()
        .map(|polygon| parse_polygon(polygon, "MultiPolygon"))
        .collect::<Result<Vec<_>, _>>()
        .map(MultiPolygon::new)
}

fn parse_polygon(value: &Value, kind: &'static str) -> Result<Polygon<f64>, GeometryError> {
    let rings = as_array(value, kind, "expected an array of linear rings")?;
    let mut rings = rings.iter().map(|ring| parse_ring(ring, kind));
    let exterior = rings
        .next()
        .ok_or_else(|| GeometryError::MalformedCoordinates {
            kind,
            reason: "polygon has no exterior ring".to_owned(),
        })??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(value: &Value, kind: &'static str) -> Result<LineString<f64>, GeometryError> {
    let positions = as_array(value, kind, "expected an array of positions")?;
    if positions.len() < 3 {
        return Err(GeometryError::MalformedCoordinates {
            kind,
            reason: format!("ring has {} positions; at least 3 are required", positions.len()),
        });
    }
    positions
        .iter()
        .map(|position| parse_position(position, kind))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

fn parse_position(value: &Value, kind: &'static str) -> Result<Coord<f64>, GeometryError> {
    let malformed = || GeometryError::MalformedCoordinates {
        kind,
        reason: format!("invalid position {value}"),
    };
    let ordinates = value.as_array().ok_or_else(malformed)?;
    match ordinates.as_slice() {
        [x, y, ..] => {
            let x = x.as_f64().filter(|v| v.is_finite()).ok_or_else(malformed)?;
            let y = y.as_f64().filter(|v| v.is_finite()).ok_or_else(malformed)?;
            Ok(Coord { x, y })
        }
        _ => Err(malformed()),
    }
}

fn as_array<'a>(
    value: &'a Value,
    kind: &'static str,
    reason: &str,
) -> Result<&'a Vec<Value>, GeometryError> {
    value
        .as_array()
        .ok_or_else(|| GeometryError::MalformedCoordinates {
            kind,
            reason: reason.to_owned(),
        })
}
