//! Facade crate for placesweep.
//!
//! Re-exports the domain types from `placesweep-core` and the pipeline entry
//! points from `placesweep-data`, so callers can depend on a single crate to
//! sample a boundary, harvest nearby places and deliver the result.

#![forbid(unsafe_code)]

pub use placesweep_core::{
    ArtifactRef, ArtifactStore, Boundary, GeometryError, GridError, GridStep, NearbyQuery,
    PageRequest, PlaceFeature, PlaceSearch, RawPlace, RunStatistics, SampleGrid, SamplePoint,
    SearchError, SearchPage, StoreError, TableRef, WarehouseError, WarehouseRow, WarehouseSink,
};

pub use placesweep_data::search::{HttpPlaceSearch, HttpPlaceSearchConfig, PaginationPolicy};
pub use placesweep_data::{
    CancelFlag, Destination, FsArtifactStore, HarvestError, HarvestHandle, NdjsonWarehouse,
    RunContext, RunFailure, RunReport, RunSettings, latest_artifact, load_boundary, run_harvest,
    spawn_harvest,
};
