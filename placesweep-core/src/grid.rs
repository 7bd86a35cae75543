//! Regular sampling grid laid over a boundary's bounding box.
//!
//! Grid coordinates are derived by integer step counting from the bounding
//! box minimum (`min + i * step`) so the number of candidates never depends
//! on accumulated floating-point error.

use std::fmt;

use geo::Coord;
use thiserror::Error;

use crate::Boundary;

/// Slack applied before rounding a span/step ratio up, so spans that are an
/// exact multiple of the step do not gain a column through representation
/// error.
const STEP_COUNT_TOLERANCE: f64 = 1.0e-9;

/// Errors raised when configuring a sampling grid.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GridError {
    /// The step was zero, negative, or not a finite number.
    #[error("grid step must be a positive, finite number of degrees (got {step})")]
    NonPositiveStep {
        /// Rejected step value.
        step: f64,
    },
}

/// Angular distance between neighbouring grid coordinates, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStep(f64);

impl GridStep {
    /// Validate and wrap a step size.
    ///
    /// # Examples
    /// ```
    /// use placesweep_core::GridStep;
    ///
    /// assert!(GridStep::new(0.0005).is_ok());
    /// assert!(GridStep::new(0.0).is_err());
    /// ```
    pub fn new(degrees: f64) -> Result<Self, GridError> {
        if degrees.is_finite() && degrees > 0.0 {
            Ok(Self(degrees))
        } else {
            Err(GridError::NonPositiveStep { step: degrees })
        }
    }

    /// Step size in degrees.
    #[must_use]
    pub fn degrees(self) -> f64 {
        self.0
    }
}

/// A grid coordinate covered by the sampling boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint(Coord<f64>);

impl SamplePoint {
    /// Latitude in degrees.
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.0.y
    }

    /// Longitude in degrees.
    #[must_use]
    pub fn lon(&self) -> f64 {
        self.0.x
    }

    /// Coordinate with `x = longitude` and `y = latitude`.
    #[must_use]
    pub fn coord(&self) -> Coord<f64> {
        self.0
    }

    /// Construct a sample point without a containment check.
    ///
    /// Intended for collaborators that receive points from elsewhere, such as
    /// test doubles keyed by location.
    #[must_use]
    pub fn unchecked(lat: f64, lon: f64) -> Self {
        Self(Coord { x: lon, y: lat })
    }
}

impl fmt::Display for SamplePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat(), self.lon())
    }
}

/// Lazy walk over the grid candidates a boundary covers.
///
/// The walk starts at the bounding box minimum and advances longitude first,
/// then latitude. Only covered candidates are yielded. A clone continues from
/// the same position; call [`SampleGrid::new`] again for a fresh walk.
///
/// # Examples
/// ```
/// use placesweep_core::{Boundary, GridStep, SampleGrid};
/// use serde_json::json;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let boundary = Boundary::from_geojson(&json!({
///     "type": "Polygon",
///     "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
/// }))?;
/// let grid = SampleGrid::new(&boundary, GridStep::new(0.5)?);
/// assert_eq!(grid.candidate_count(), 4);
/// assert_eq!(grid.count(), 4);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SampleGrid<'a> {
    boundary: &'a Boundary,
    origin: Coord<f64>,
    step: f64,
    columns: u64,
    candidates: u64,
    next: u64,
}

impl<'a> SampleGrid<'a> {
    /// Prepare a walk over `boundary` at the given step.
    #[must_use]
    pub fn new(boundary: &'a Boundary, step: GridStep) -> Self {
        let bounds = boundary.bounds();
        let step = step.degrees();
        let columns = axis_steps(bounds.width(), step);
        let rows = axis_steps(bounds.height(), step);
        Self {
            boundary,
            origin: bounds.min(),
            step,
            columns,
            candidates: rows.saturating_mul(columns),
            next: 0,
        }
    }

    /// Number of grid coordinates tested by a full walk.
    #[must_use]
    pub fn candidate_count(&self) -> u64 {
        self.candidates
    }

    fn candidate(&self, index: u64) -> Coord<f64> {
        let row = index / self.columns;
        let column = index % self.columns;
        Coord {
            x: self.origin.x + column as f64 * self.step,
            y: self.origin.y + row as f64 * self.step,
        }
    }
}

impl Iterator for SampleGrid<'_> {
    type Item = SamplePoint;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.candidates {
            let coord = self.candidate(self.next);
            self.next += 1;
            if self.boundary.covers(coord) {
                return Some(SamplePoint(coord));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.candidates - self.next).ok();
        (0, remaining)
    }
}

/// Number of coordinates to test along one axis: `ceil(span / step)`, never
/// less than one so degenerate spans still test the minimum corner.
fn axis_steps(span: f64, step: f64) -> u64 {
    let ratio = span / step;
    if !ratio.is_finite() || ratio <= 0.0 {
        return 1;
    }
    // Float-to-int `as` saturates, which caps absurd ratios at `u64::MAX`.
    (ratio - STEP_COUNT_TOLERANCE).ceil().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    fn polygon(points: &[(f64, f64)]) -> Boundary {
        let ring: LineString<f64> = points.iter().copied().collect();
        Boundary::from_polygon(Polygon::new(ring, Vec::new())).expect("fixture polygon")
    }

    #[fixture]
    fn unit_square() -> Boundary {
        polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)])
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.5)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn rejects_invalid_steps(#[case] step: f64) {
        let err = GridStep::new(step).expect_err("step should be rejected");
        assert!(matches!(err, GridError::NonPositiveStep { .. }));
    }

    #[rstest]
    fn unit_square_at_half_degree_yields_four_points(unit_square: Boundary) {
        let step = GridStep::new(0.5).expect("valid step");
        let grid = SampleGrid::new(&unit_square, step);
        assert_eq!(grid.candidate_count(), 4);
        let points: Vec<_> = grid.map(|point| (point.lat(), point.lon())).collect();
        assert_eq!(
            points,
            vec![(0.0, 0.0), (0.0, 0.5), (0.5, 0.0), (0.5, 0.5)],
            "expected longitude-first walk from the minimum corner"
        );
    }

    #[rstest]
    fn walk_is_restartable(unit_square: Boundary) {
        let step = GridStep::new(0.25).expect("valid step");
        let first: Vec<_> = SampleGrid::new(&unit_square, step).collect();
        let second: Vec<_> = SampleGrid::new(&unit_square, step).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
    }

    #[rstest]
    #[case::exact_tenths(0.1, 100)]
    #[case::thirds(1.0 / 3.0, 9)]
    #[case::oversized(2.0, 1)]
    fn candidate_count_does_not_drift(
        unit_square: Boundary,
        #[case] step: f64,
        #[case] expected: u64,
    ) {
        let grid = SampleGrid::new(&unit_square, GridStep::new(step).expect("valid step"));
        assert_eq!(grid.candidate_count(), expected);
    }

    #[rstest]
    fn tiny_boundary_tests_only_the_corner() {
        let boundary = polygon(&[(10.0, 10.0), (10.001, 10.0), (10.001, 10.001), (10.0, 10.001)]);
        let grid = SampleGrid::new(&boundary, GridStep::new(0.5).expect("valid step"));
        assert_eq!(grid.candidate_count(), 1);
        let points: Vec<_> = grid.collect();
        assert_eq!(points.len(), 1);
        assert_eq!(points.first().map(SamplePoint::lon), Some(10.0));
    }

    #[rstest]
    fn tiny_boundary_with_uncovered_corner_is_empty() {
        // The bounding box minimum (0, 0) lies outside this triangle.
        let boundary = polygon(&[(0.001, 0.0), (0.002, 0.002), (0.0, 0.002)]);
        let grid = SampleGrid::new(&boundary, GridStep::new(0.5).expect("valid step"));
        assert_eq!(grid.candidate_count(), 1);
        assert_eq!(grid.count(), 0);
    }

    #[rstest]
    fn sample_point_formats_as_lat_lon() {
        let point = SamplePoint::unchecked(19.07, 72.87);
        assert_eq!(point.to_string(), "19.07,72.87");
    }

    proptest! {
        #[test]
        fn every_sample_point_is_covered(
            origin_x in -170.0_f64..170.0,
            origin_y in -80.0_f64..80.0,
            width in 0.01_f64..5.0,
            height in 0.01_f64..5.0,
            apex in 0.0_f64..1.0,
            step in 0.05_f64..1.0,
        ) {
            let boundary = polygon(&[
                (origin_x, origin_y),
                (origin_x + width, origin_y),
                (origin_x + apex * width, origin_y + height),
            ]);
            let grid = SampleGrid::new(&boundary, GridStep::new(step).expect("valid step"));
            let candidates = grid.candidate_count();
            let mut yielded = 0_u64;
            for point in grid {
                prop_assert!(boundary.covers(point.coord()));
                yielded += 1;
            }
            prop_assert!(yielded <= candidates);
        }
    }
}
