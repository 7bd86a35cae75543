//! Adapters and orchestration for placesweep.
//!
//! Responsibilities:
//! - Talk to the place-search provider over HTTP and walk its pagination.
//! - Harvest a boundary with bounded concurrency and deduplicate results.
//! - Deliver features as a GeoJSON artifact and warehouse rows.
//! - Provide local filesystem adapters for both destinations.
//!
//! Boundaries:
//! - Geometry, sampling and feature assembly live in `placesweep-core`.
//! - Blocking filesystem I/O runs on Tokio's blocking pool.
//!
//! Invariants:
//! - Each run owns its deduplication index; no global mutable state.
//! - Artifacts are write-once; warehouse loads are appends.

mod error;
pub mod harvest;
pub mod run;
pub mod search;
pub mod sink;
pub mod store;

#[doc(hidden)]
pub mod test_support;

pub use error::HarvestError;
pub use harvest::{CancelFlag, Harvest, HarvestSettings, Harvester};
pub use run::{
    BoundaryLoadError, HarvestHandle, RunContext, RunFailure, RunReport, RunSettings,
    latest_artifact, load_boundary, run_harvest, spawn_harvest,
};
pub use sink::{Delivery, DeliveryError, Destination, SinkWriter, read_feature_collection};
pub use store::{FsArtifactStore, NdjsonWarehouse};
