//! Local adapters for the artifact store and warehouse traits.
//!
//! Both adapters perform blocking filesystem calls through `cap-std`, so each
//! operation runs on Tokio's blocking pool.

mod fs;
mod ndjson;

pub use fs::FsArtifactStore;
pub use ndjson::NdjsonWarehouse;

use camino::{Utf8Component, Utf8Path};

/// Whether `path` is a plain relative path that cannot escape its root.
fn is_contained(path: &Utf8Path) -> bool {
    !path.as_str().is_empty()
        && !path.as_str().contains('\\')
        && path
            .components()
            .all(|component| matches!(component, Utf8Component::Normal(_)))
}
