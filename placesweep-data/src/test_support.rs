//! In-memory doubles for the storage traits, used by unit and behaviour
//! tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use placesweep_core::{
    ArtifactRef, ArtifactStore, StoreError, TableRef, WarehouseError, WarehouseRow, WarehouseSink,
};

pub use crate::search::test_support::{StubPlaceSearch, page, place};

#[derive(Debug, Clone)]
struct Blob {
    content_type: String,
    body: Vec<u8>,
}

/// Write-once `ArtifactStore` held in memory.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<BTreeMap<String, Blob>>,
}

impl MemoryArtifactStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded for `key`.
    #[must_use]
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|blob| blob.content_type.clone())
    }

    /// Every stored key in lexical order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Blob>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<ArtifactRef, StoreError> {
        let mut blobs = self.lock();
        if blobs.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                key: key.to_owned(),
            });
        }
        blobs.insert(
            key.to_owned(),
            Blob {
                content_type: content_type.to_owned(),
                body: body.to_vec(),
            },
        );
        Ok(ArtifactRef {
            uri: format!("memory://{key}"),
            key: key.to_owned(),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.lock()
            .get(key)
            .map(|blob| blob.body.clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_owned(),
            })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// `WarehouseSink` collecting rows per table in memory.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: Mutex<HashMap<String, Vec<WarehouseRow>>>,
}

impl MemoryWarehouse {
    /// Create an empty warehouse.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows appended to `table` so far.
    #[must_use]
    pub fn rows(&self, table: &TableRef) -> Vec<WarehouseRow> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table.to_string())
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl WarehouseSink for MemoryWarehouse {
    async fn append(&self, table: &TableRef, rows: &[WarehouseRow]) -> Result<u64, WarehouseError> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(rows);
        Ok(rows.len() as u64)
    }
}

/// `WarehouseSink` that rejects every load.
#[derive(Debug, Clone)]
pub struct FailingWarehouse {
    message: String,
}

impl FailingWarehouse {
    /// Create a warehouse rejecting loads with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl WarehouseSink for FailingWarehouse {
    async fn append(
        &self,
        table: &TableRef,
        _rows: &[WarehouseRow],
    ) -> Result<u64, WarehouseError> {
        Err(WarehouseError::Rejected {
            table: table.to_string(),
            message: self.message.clone(),
        })
    }
}
