//! Durable destinations for harvested features.
//!
//! Two collaborators receive a run's output: an [`ArtifactStore`] holding
//! write-once blobs and a [`WarehouseSink`] accepting appended rows. Both are
//! passed explicitly to the code that uses them; there are no process-wide
//! clients.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FeatureProperties, PlaceFeature};

/// Location of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Fully qualified URI, e.g. `file:///srv/places/exports/places_...geojson`.
    pub uri: String,
    /// Store-relative key.
    pub key: String,
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Errors raised by an [`ArtifactStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A blob already exists under the key; stores never overwrite.
    #[error("artifact {key} already exists")]
    AlreadyExists {
        /// Conflicting key.
        key: String,
    },
    /// No blob exists under the key.
    #[error("artifact {key} was not found")]
    NotFound {
        /// Missing key.
        key: String,
    },
    /// The key cannot be represented by the store.
    #[error("invalid artifact key {key:?}: {reason}")]
    InvalidKey {
        /// Rejected key.
        key: String,
        /// Why the key was rejected.
        reason: &'static str,
    },
    /// Reading or writing the blob failed.
    #[error("I/O error for artifact {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Write-once blob storage.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `body` under `key`. The write is atomic: readers observe either
    /// nothing or the whole blob. Fails with [`StoreError::AlreadyExists`]
    /// when the key is taken.
    async fn put(&self, key: &str, content_type: &str, body: &[u8])
    -> Result<ArtifactRef, StoreError>;

    /// Fetch the blob stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// List keys that start with `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Destination table in the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    /// Dataset (schema) name.
    pub dataset: String,
    /// Table name.
    pub table: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// One warehouse row per feature: its properties plus flattened coordinates
/// and the ingestion date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseRow {
    /// Feature attributes.
    #[serde(flatten)]
    pub properties: FeatureProperties,
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
    /// UTC date the row was produced.
    pub ingestion_date: NaiveDate,
}

impl WarehouseRow {
    /// Flatten a feature into a row stamped with `ingestion_date`.
    #[must_use]
    pub fn from_feature(feature: &PlaceFeature, ingestion_date: NaiveDate) -> Self {
        Self {
            properties: FeatureProperties::from(feature),
            lon: feature.location.x,
            lat: feature.location.y,
            ingestion_date,
        }
    }
}

/// Errors raised by a [`WarehouseSink`].
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// Rows could not be encoded for the destination.
    #[error("failed to encode rows for {table}: {source}")]
    Encode {
        /// Destination table.
        table: String,
        /// Encoder error.
        #[source]
        source: serde_json::Error,
    },
    /// Writing to the destination failed.
    #[error("failed to append rows to {table}: {source}")]
    Io {
        /// Destination table.
        table: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The destination rejected the load.
    #[error("warehouse rejected load into {table}: {message}")]
    Rejected {
        /// Destination table.
        table: String,
        /// Rejection reason.
        message: String,
    },
}

/// Append-only warehouse table loader.
///
/// Appending the same rows twice stores them twice; callers that need
/// exactly-once loads must deduplicate downstream.
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Append `rows` to `table`, returning the number of rows written.
    async fn append(&self, table: &TableRef, rows: &[WarehouseRow]) -> Result<u64, WarehouseError>;
}
