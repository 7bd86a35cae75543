//! Counters describing one harvesting run.

use std::fmt;

use serde::Serialize;

/// Counters accumulated over one harvesting run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Sample points whose search was attempted.
    pub points_visited: u64,
    /// Requests issued to the search provider, continuations included.
    pub api_calls: u64,
    /// Unique features accepted into the output.
    pub features_produced: u64,
    /// Sample points whose first page failed.
    pub failed_points: u64,
    /// Points whose pagination ended early.
    pub truncated_points: u64,
    /// Results rejected because their own location lies outside the boundary.
    pub outside_boundary: u64,
    /// Results dropped because their place id was already accepted.
    pub duplicates_dropped: u64,
    /// Results without a place id or a usable location.
    pub unlocatable: u64,
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "points={} calls={} features={} failed={} truncated={} outside={} duplicates={} unlocatable={}",
            self.points_visited,
            self.api_calls,
            self.features_produced,
            self.failed_points,
            self.truncated_points,
            self.outside_boundary,
            self.duplicates_dropped,
            self.unlocatable,
        )
    }
}
