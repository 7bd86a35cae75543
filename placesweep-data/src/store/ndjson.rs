//! Newline-delimited JSON [`WarehouseSink`].

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use placesweep_core::{TableRef, WarehouseError, WarehouseRow, WarehouseSink};

use super::is_contained;

/// Warehouse that appends rows to `<root>/<dataset>/<table>.ndjson`.
#[derive(Debug, Clone)]
pub struct NdjsonWarehouse {
    dir: Arc<Dir>,
}

impl NdjsonWarehouse {
    /// Open (creating if needed) the warehouse rooted at `root`.
    pub fn open(root: &Utf8Path) -> io::Result<Self> {
        Ok(Self {
            dir: Arc::new(placesweep_fs::open_root(root)?),
        })
    }

    /// Path of `table` relative to the root.
    #[must_use]
    pub fn table_path(table: &TableRef) -> Utf8PathBuf {
        Utf8PathBuf::from(&table.dataset).join(format!("{}.ndjson", table.table))
    }
}

fn encode_rows(table: &TableRef, rows: &[WarehouseRow]) -> Result<Vec<u8>, WarehouseError> {
    let mut buffer = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut buffer, row).map_err(|source| WarehouseError::Encode {
            table: table.to_string(),
            source,
        })?;
        buffer.push(b'\n');
    }
    Ok(buffer)
}

#[async_trait]
impl WarehouseSink for NdjsonWarehouse {
    async fn append(&self, table: &TableRef, rows: &[WarehouseRow]) -> Result<u64, WarehouseError> {
        let valid = |name: &str| !name.contains('/') && is_contained(Utf8Path::new(name));
        if !valid(&table.dataset) || !valid(&table.table) {
            return Err(WarehouseError::Rejected {
                table: table.to_string(),
                message: "dataset and table must be single path segments".to_string(),
            });
        }
        let count = rows.len() as u64;
        if rows.is_empty() {
            return Ok(0);
        }
        let body = encode_rows(table, rows)?;
        let path = Self::table_path(table);
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || placesweep_fs::append(&dir, &path, &body))
            .await
            .map_err(|err| io::Error::other(err.to_string()))
            .and_then(|result| result)
            .map_err(|source| WarehouseError::Io {
                table: table.to_string(),
                source,
            })?;
        Ok(count)
    }
}
