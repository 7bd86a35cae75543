//! Core domain types for placesweep.
//!
//! This crate holds the pure parts of a harvest: boundary parsing and
//! containment, grid sampling, feature assembly and run statistics. It also
//! defines the collaborator traits ([`PlaceSearch`], [`ArtifactStore`],
//! [`WarehouseSink`]) that adapters in `placesweep-data` implement.

pub mod boundary;
pub mod grid;
pub mod place;
pub mod search;
pub mod stats;
pub mod store;

pub use boundary::{Boundary, GeometryError};
pub use grid::{GridError, GridStep, SampleGrid, SamplePoint};
pub use place::{
    FeatureProperties, PlaceFeature, RawGeometry, RawLocation, RawPlace, RawPlusCode, assemble,
    assemble_now, format_timestamp,
};
pub use search::{NearbyQuery, PageRequest, PlaceSearch, SearchError, SearchPage};
pub use stats::RunStatistics;
pub use store::{
    ArtifactRef, ArtifactStore, StoreError, TableRef, WarehouseError, WarehouseRow, WarehouseSink,
};
