//! Bounded-concurrency harvesting over a sample grid.
//!
//! Sample points are pulled lazily from the grid and searched by at most
//! `concurrency` workers at a time. Results from every point funnel through a
//! single merge step that owns the deduplication index, the output list and
//! the statistics.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures_util::{StreamExt, future, stream};
use log::{info, warn};
use placesweep_core::{
    Boundary, GridStep, NearbyQuery, PlaceFeature, PlaceSearch, RawPlace, RunStatistics,
    SampleGrid, SamplePoint, assemble,
};
use tokio::sync::Mutex;

use crate::HarvestError;
use crate::search::{PaginationPolicy, PointStatus, collect_point};

/// Default number of points searched at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Shared flag asking a running harvest to stop pulling new points.
///
/// Points already being searched finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a lowered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestSettings {
    /// Search radius around each sample point, in metres.
    pub radius_m: u32,
    /// Optional provider category filter.
    pub category: Option<String>,
    /// Maximum points searched at once.
    pub concurrency: usize,
    /// Continuation pacing.
    pub pagination: PaginationPolicy,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            radius_m: 300,
            category: None,
            concurrency: DEFAULT_CONCURRENCY,
            pagination: PaginationPolicy::default(),
        }
    }
}

/// Output of a harvest.
#[derive(Debug, Clone, PartialEq)]
pub struct Harvest {
    /// Unique features in merge order.
    pub features: Vec<PlaceFeature>,
    /// Counters for the run.
    pub statistics: RunStatistics,
    /// Whether the run stopped pulling points because it was cancelled.
    pub cancelled: bool,
}

#[derive(Default)]
struct MergeState {
    seen: HashSet<String>,
    features: Vec<PlaceFeature>,
    statistics: RunStatistics,
}

impl MergeState {
    fn accept(&mut self, raw: &RawPlace, boundary: &Boundary, collected_at: DateTime<Utc>) {
        let Some(feature) = assemble(raw, collected_at) else {
            self.statistics.unlocatable += 1;
            return;
        };
        if !boundary.covers(feature.location) {
            self.statistics.outside_boundary += 1;
            return;
        }
        if !self.seen.insert(feature.place_id.clone()) {
            self.statistics.duplicates_dropped += 1;
            return;
        }
        self.features.push(feature);
        self.statistics.features_produced += 1;
    }
}

/// Searches every sample point of a boundary and merges the results.
pub struct Harvester<'a> {
    search: &'a dyn PlaceSearch,
    settings: HarvestSettings,
}

impl<'a> Harvester<'a> {
    /// Create a harvester issuing requests through `search`.
    #[must_use]
    pub fn new(search: &'a dyn PlaceSearch, settings: HarvestSettings) -> Self {
        Self { search, settings }
    }

    /// Harvest every point the boundary covers at the given step.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::EmptySampleSet`] before any request when the
    /// boundary covers no grid point. Search failures never abort the run.
    pub async fn run(
        &self,
        boundary: &Boundary,
        step: GridStep,
        cancel: &CancelFlag,
    ) -> Result<Harvest, HarvestError> {
        let grid = SampleGrid::new(boundary, step);
        let candidates = grid.candidate_count();
        let mut points = grid.peekable();
        if points.peek().is_none() {
            return Err(HarvestError::EmptySampleSet { candidates });
        }

        let concurrency = self.settings.concurrency.max(1);
        info!(
            "harvest starting: {candidates} grid candidates, step {}, radius {}m, concurrency {concurrency}",
            step.degrees(),
            self.settings.radius_m
        );

        let merge = Mutex::new(MergeState::default());
        let stopped_early = AtomicBool::new(false);
        stream::iter(points)
            .take_while(|_| {
                let go = !cancel.is_cancelled();
                if !go {
                    stopped_early.store(true, Ordering::SeqCst);
                }
                future::ready(go)
            })
            .map(|point| self.visit(point, boundary, &merge))
            .buffer_unordered(concurrency)
            .collect::<()>()
            .await;

        let state = merge.into_inner();
        let cancelled = stopped_early.into_inner();
        if cancelled {
            warn!("harvest cancelled: {}", state.statistics);
        } else {
            info!("harvest finished: {}", state.statistics);
        }
        Ok(Harvest {
            features: state.features,
            statistics: state.statistics,
            cancelled,
        })
    }

    async fn visit(&self, point: SamplePoint, boundary: &Boundary, merge: &Mutex<MergeState>) {
        let query = NearbyQuery {
            location: point,
            radius_m: self.settings.radius_m,
            category: self.settings.category.clone(),
        };
        let outcome = collect_point(self.search, query, self.settings.pagination).await;
        let collected_at = Utc::now();

        if let PointStatus::Failed(err) = &outcome.status {
            warn!("point {point}: search failed: {err}");
        }

        let mut state = merge.lock().await;
        state.statistics.points_visited += 1;
        state.statistics.api_calls += outcome.api_calls;
        match outcome.status {
            PointStatus::Failed(_) => {
                state.statistics.failed_points += 1;
                return;
            }
            PointStatus::Truncated => state.statistics.truncated_points += 1,
            PointStatus::Complete => {}
        }
        for raw in &outcome.results {
            state.accept(raw, boundary, collected_at);
        }
    }
}
