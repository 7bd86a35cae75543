//! Delivery of harvested features to durable storage.
//!
//! Delivery is two ordered steps: a GeoJSON artifact is written to the
//! [`ArtifactStore`], then one row per feature is appended to the
//! [`WarehouseSink`]. The warehouse step only runs after the artifact is
//! durable, and a warehouse failure still reports where the artifact went.

pub mod artifact;

use chrono::{DateTime, Utc};
use log::{info, warn};
use placesweep_core::{
    ArtifactRef, ArtifactStore, PlaceFeature, StoreError, TableRef, WarehouseError, WarehouseRow,
    WarehouseSink,
};
use serde::Serialize;
use thiserror::Error;

pub use artifact::{
    ArtifactFormatError, CONTENT_TYPE, artifact_key, encode_feature_collection, is_artifact_key,
    read_feature_collection,
};

/// Attempts made to find a free artifact key before giving up.
pub const MAX_KEY_ATTEMPTS: u32 = 16;

/// Where a run's output goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    /// Key prefix for artifacts.
    pub prefix: String,
    /// Warehouse dataset.
    pub dataset: String,
    /// Warehouse table.
    pub table: String,
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            prefix: "places_exports".to_string(),
            dataset: "places".to_string(),
            table: "pois".to_string(),
        }
    }
}

impl Destination {
    /// Warehouse table reference.
    #[must_use]
    pub fn table_ref(&self) -> TableRef {
        TableRef {
            dataset: self.dataset.clone(),
            table: self.table.clone(),
        }
    }
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Where the artifact was written.
    pub artifact: ArtifactRef,
    /// Rows appended to the warehouse.
    pub warehouse_rows: u64,
}

/// Errors raised by [`SinkWriter::deliver`].
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The features could not be serialised.
    #[error("failed to encode artifact: {0}")]
    Encode(#[source] serde_json::Error),
    /// The artifact could not be stored.
    #[error("failed to store artifact: {0}")]
    Artifact(#[source] StoreError),
    /// Every candidate key was already taken.
    #[error("no free artifact key after {attempts} attempts (last tried {last_key})")]
    KeysExhausted {
        /// Attempts made.
        attempts: u32,
        /// Final key tried.
        last_key: String,
    },
    /// The artifact is durable but the warehouse load failed.
    #[error("artifact stored at {artifact} but warehouse load failed: {source}")]
    Warehouse {
        /// The valid artifact.
        artifact: ArtifactRef,
        /// Warehouse failure.
        #[source]
        source: WarehouseError,
    },
}

impl DeliveryError {
    /// The stored artifact, when the failure happened after it was written.
    #[must_use]
    pub fn artifact(&self) -> Option<&ArtifactRef> {
        match self {
            Self::Warehouse { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}

/// Writes a feature set to an artifact store and a warehouse.
pub struct SinkWriter<'a> {
    artifacts: &'a dyn ArtifactStore,
    warehouse: &'a dyn WarehouseSink,
    destination: Destination,
}

impl<'a> SinkWriter<'a> {
    /// Create a writer for `destination`.
    #[must_use]
    pub fn new(
        artifacts: &'a dyn ArtifactStore,
        warehouse: &'a dyn WarehouseSink,
        destination: Destination,
    ) -> Self {
        Self {
            artifacts,
            warehouse,
            destination,
        }
    }

    /// Store `features` as an artifact stamped `at`, then append them to the
    /// warehouse.
    ///
    /// # Errors
    ///
    /// See [`DeliveryError`]. A warehouse failure leaves the artifact in
    /// place.
    pub async fn deliver(
        &self,
        features: &[PlaceFeature],
        at: DateTime<Utc>,
    ) -> Result<Delivery, DeliveryError> {
        let body = encode_feature_collection(features).map_err(DeliveryError::Encode)?;
        let artifact = self.store_artifact(&body, at).await?;
        info!("stored {} features at {artifact}", features.len());

        let ingestion_date = at.date_naive();
        let rows: Vec<WarehouseRow> = features
            .iter()
            .map(|feature| WarehouseRow::from_feature(feature, ingestion_date))
            .collect();
        let table = self.destination.table_ref();
        match self.warehouse.append(&table, &rows).await {
            Ok(warehouse_rows) => {
                info!("appended {warehouse_rows} rows to {table}");
                Ok(Delivery {
                    artifact,
                    warehouse_rows,
                })
            }
            Err(source) => {
                warn!("warehouse load into {table} failed; artifact kept at {artifact}");
                Err(DeliveryError::Warehouse { artifact, source })
            }
        }
    }

    async fn store_artifact(
        &self,
        body: &[u8],
        at: DateTime<Utc>,
    ) -> Result<ArtifactRef, DeliveryError> {
        let mut last_key = String::new();
        for attempt in 0..MAX_KEY_ATTEMPTS {
            let key = artifact_key(&self.destination.prefix, at, attempt);
            match self.artifacts.put(&key, CONTENT_TYPE, body).await {
                Ok(stored) => return Ok(stored),
                Err(StoreError::AlreadyExists { .. }) => last_key = key,
                Err(err) => return Err(DeliveryError::Artifact(err)),
            }
        }
        Err(DeliveryError::KeysExhausted {
            attempts: MAX_KEY_ATTEMPTS,
            last_key,
        })
    }
}
