//! Run-level error taxonomy.

use placesweep_core::{GeometryError, GridError};
use thiserror::Error;

use crate::sink::DeliveryError;

/// Errors that end a harvesting run.
///
/// Search failures are not listed here: they are absorbed per point and only
/// show up in the run statistics.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The boundary document could not be resolved to a polygon.
    #[error(transparent)]
    InvalidGeometry(#[from] GeometryError),
    /// A run setting is out of range.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfiguration {
        /// Offending setting.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The grid produced no point inside the boundary.
    #[error("no grid point falls inside the boundary ({candidates} candidates tested)")]
    EmptySampleSet {
        /// Grid coordinates tested.
        candidates: u64,
    },
    /// Delivering the harvest failed.
    #[error(transparent)]
    SinkWrite(#[from] DeliveryError),
    /// The background task running the harvest panicked or was aborted.
    #[error("harvest task failed: {0}")]
    Task(String),
}

impl HarvestError {
    /// Stable snake-case identifier for machine-readable reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidGeometry(_) => "invalid_geometry",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::EmptySampleSet { .. } => "empty_sample_set",
            Self::SinkWrite(_) => "sink_write",
            Self::Task(_) => "task",
        }
    }
}

impl From<GridError> for HarvestError {
    fn from(err: GridError) -> Self {
        Self::InvalidConfiguration {
            field: "step",
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placesweep_core::GridStep;
    use rstest::rstest;

    #[rstest]
    fn grid_errors_are_configuration_errors() {
        let err: HarvestError = GridStep::new(0.0).expect_err("zero step").into();

        assert_eq!(err.kind(), "invalid_configuration");
        assert!(err.to_string().contains("step"));
    }

    #[rstest]
    fn geometry_errors_keep_their_message() {
        let err = HarvestError::from(GeometryError::MissingGeometry);

        assert_eq!(err.kind(), "invalid_geometry");
        assert_eq!(err.to_string(), GeometryError::MissingGeometry.to_string());
    }
}
