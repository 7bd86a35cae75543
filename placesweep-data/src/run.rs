//! Run trigger: validate settings, harvest, deliver, report.
//!
//! [`run_harvest`] drives one run to completion on the caller's task.
//! [`spawn_harvest`] runs it in the background and hands back a
//! [`HarvestHandle`] that can cancel and await it.

use std::sync::Arc;

use chrono::Utc;
use log::info;
use placesweep_core::{
    ArtifactRef, ArtifactStore, Boundary, GeometryError, GridStep, PlaceSearch, RunStatistics,
    StoreError, WarehouseSink,
};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::HarvestError;
use crate::harvest::{CancelFlag, DEFAULT_CONCURRENCY, HarvestSettings, Harvester};
use crate::search::PaginationPolicy;
use crate::sink::{Destination, SinkWriter, is_artifact_key};

/// Default grid step in degrees, roughly 55 m of latitude.
pub const DEFAULT_STEP: f64 = 0.0005;

/// Default search radius in metres.
pub const DEFAULT_RADIUS_M: u32 = 300;

/// Everything a run needs besides the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Grid step in degrees.
    pub step: f64,
    /// Search radius in metres.
    pub radius_m: u32,
    /// Optional provider category filter.
    pub category: Option<String>,
    /// Maximum points searched at once.
    pub concurrency: usize,
    /// Continuation pacing.
    pub pagination: PaginationPolicy,
    /// Output locations.
    pub destination: Destination,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            radius_m: DEFAULT_RADIUS_M,
            category: None,
            concurrency: DEFAULT_CONCURRENCY,
            pagination: PaginationPolicy::default(),
            destination: Destination::default(),
        }
    }
}

impl RunSettings {
    /// Check every setting and return the validated grid step.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidConfiguration`] naming the first
    /// offending setting.
    pub fn validate(&self) -> Result<GridStep, HarvestError> {
        let step = GridStep::new(self.step)?;
        let invalid = |field: &'static str, reason: &str| HarvestError::InvalidConfiguration {
            field,
            reason: reason.to_owned(),
        };
        if self.radius_m == 0 {
            return Err(invalid("radius", "must be at least one metre"));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency", "must be at least one"));
        }
        let destination = &self.destination;
        if destination.prefix.trim_matches('/').is_empty() {
            return Err(invalid("prefix", "must not be empty"));
        }
        if destination.dataset.is_empty() {
            return Err(invalid("dataset", "must not be empty"));
        }
        if destination.table.is_empty() {
            return Err(invalid("table", "must not be empty"));
        }
        Ok(step)
    }

    fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            radius_m: self.radius_m,
            category: self.category.clone(),
            concurrency: self.concurrency,
            pagination: self.pagination,
        }
    }
}

/// Collaborators shared by runs.
#[derive(Clone)]
pub struct RunContext {
    /// Place search provider.
    pub search: Arc<dyn PlaceSearch>,
    /// Artifact destination.
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Warehouse destination.
    pub warehouse: Arc<dyn WarehouseSink>,
}

/// Success payload of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Always `"ok"`.
    pub status: &'static str,
    /// Stored artifact.
    pub artifact: ArtifactRef,
    /// Unique features delivered.
    pub feature_count: u64,
    /// Requests issued to the provider.
    pub call_count: u64,
    /// Points whose search failed.
    pub failed_points: u64,
    /// Rows appended to the warehouse.
    pub warehouse_rows: u64,
    /// Whether the run was cancelled before visiting every point.
    pub cancelled: bool,
    /// Full counters.
    pub statistics: RunStatistics,
}

/// Error payload of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    /// Always `"error"`.
    pub status: &'static str,
    /// Stable error kind, see [`HarvestError::kind`].
    pub error: &'static str,
    /// Human readable detail.
    pub detail: String,
    /// Artifact written before the failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
}

impl From<&HarvestError> for RunFailure {
    fn from(err: &HarvestError) -> Self {
        let artifact = match err {
            HarvestError::SinkWrite(delivery) => delivery.artifact().cloned(),
            _ => None,
        };
        Self {
            status: "error",
            error: err.kind(),
            detail: err.to_string(),
            artifact,
        }
    }
}

/// Run a full harvest: validate, sample, search, deliver.
///
/// A cancelled run still delivers what it gathered and reports
/// `cancelled: true`.
///
/// # Errors
///
/// See [`HarvestError`]. Per-point search failures do not fail the run.
pub async fn run_harvest(
    context: &RunContext,
    boundary: &Boundary,
    settings: &RunSettings,
    cancel: &CancelFlag,
) -> Result<RunReport, HarvestError> {
    let step = settings.validate()?;
    let harvester = Harvester::new(context.search.as_ref(), settings.harvest_settings());
    let harvest = harvester.run(boundary, step, cancel).await?;

    let writer = SinkWriter::new(
        context.artifacts.as_ref(),
        context.warehouse.as_ref(),
        settings.destination.clone(),
    );
    let delivery = writer.deliver(&harvest.features, Utc::now()).await?;
    let statistics = harvest.statistics;
    info!(
        "run complete: {} features, {} calls, artifact {}",
        statistics.features_produced, statistics.api_calls, delivery.artifact
    );
    Ok(RunReport {
        status: "ok",
        artifact: delivery.artifact,
        feature_count: statistics.features_produced,
        call_count: statistics.api_calls,
        failed_points: statistics.failed_points,
        warehouse_rows: delivery.warehouse_rows,
        cancelled: harvest.cancelled,
        statistics,
    })
}

/// Handle to a harvest running in the background.
#[derive(Debug)]
pub struct HarvestHandle {
    cancel: CancelFlag,
    task: JoinHandle<Result<RunReport, HarvestError>>,
}

impl HarvestHandle {
    /// Stop pulling new points; in-flight points finish and the gathered
    /// features are still delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the run's cancel flag, for signal handlers that outlive a
    /// borrow of the handle.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Whether the run has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end.
    ///
    /// # Errors
    ///
    /// Returns the run's own error, or [`HarvestError::Task`] when the task
    /// panicked or was aborted.
    pub async fn join(self) -> Result<RunReport, HarvestError> {
        self.task
            .await
            .map_err(|err| HarvestError::Task(err.to_string()))?
    }
}

/// Start a harvest on the Tokio runtime.
///
/// Must be called from within a runtime.
#[must_use]
pub fn spawn_harvest(
    context: Arc<RunContext>,
    boundary: Boundary,
    settings: RunSettings,
) -> HarvestHandle {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    let task = tokio::spawn(async move {
        run_harvest(&context, &boundary, &settings, &flag).await
    });
    HarvestHandle { cancel, task }
}

/// Errors raised by [`load_boundary`].
#[derive(Debug, Error)]
pub enum BoundaryLoadError {
    /// The boundary document could not be fetched.
    #[error("failed to fetch boundary {key}: {source}")]
    Fetch {
        /// Store key.
        key: String,
        /// Store failure.
        #[source]
        source: StoreError,
    },
    /// The document is not a usable boundary.
    #[error("boundary {key} is invalid: {source}")]
    Invalid {
        /// Store key.
        key: String,
        /// Geometry failure.
        #[source]
        source: GeometryError,
    },
}

/// Fetch and parse a boundary document held in artifact storage.
///
/// # Errors
///
/// [`BoundaryLoadError::Fetch`] when the key cannot be read and
/// [`BoundaryLoadError::Invalid`] when the bytes are not a polygon document.
pub async fn load_boundary(
    store: &dyn ArtifactStore,
    key: &str,
) -> Result<Boundary, BoundaryLoadError> {
    let bytes = store
        .get(key)
        .await
        .map_err(|source| BoundaryLoadError::Fetch {
            key: key.to_owned(),
            source,
        })?;
    Boundary::from_slice(&bytes).map_err(|source| BoundaryLoadError::Invalid {
        key: key.to_owned(),
        source,
    })
}

/// Newest artifact key under `prefix`, or `None` when there is none.
///
/// Artifact names embed their UTC timestamp, so the lexically greatest key is
/// the newest. Same-second collision suffixes sort after the plain key.
///
/// # Errors
///
/// Propagates the store's listing failure.
pub async fn latest_artifact(
    store: &dyn ArtifactStore,
    prefix: &str,
) -> Result<Option<String>, StoreError> {
    let directory = format!("{}/", prefix.trim_end_matches('/'));
    let keys = store.list(&directory).await?;
    Ok(keys
        .into_iter()
        .filter(|key| is_artifact_key(prefix, key))
        .max_by(|a, b| artifact_order(a).cmp(&artifact_order(b))))
}

/// Sort key `(timestamp, suffix)` so `_10` sorts after `_9`.
fn artifact_order(key: &str) -> (&str, u32) {
    let name = key.rsplit('/').next().unwrap_or(key);
    let stem = name
        .strip_suffix(crate::sink::artifact::FILE_EXTENSION)
        .unwrap_or(name);
    match stem.split_once('_').and_then(|(_, rest)| rest.split_once('_')) {
        Some((stamp, suffix)) => (stamp, suffix.parse().unwrap_or(0)),
        None => (stem.split_once('_').map_or(stem, |(_, stamp)| stamp), 0),
    }
}
