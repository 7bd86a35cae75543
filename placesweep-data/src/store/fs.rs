//! Filesystem-backed [`ArtifactStore`].

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use log::debug;
use placesweep_core::{ArtifactRef, ArtifactStore, StoreError};

use super::is_contained;

/// Write-once artifact store rooted at a local directory.
///
/// Keys are `/`-separated paths relative to the root. Writes go through a
/// temporary file and a hard link, so a key is either absent or complete and
/// existing keys are never replaced.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: Utf8PathBuf,
    dir: Arc<Dir>,
}

impl FsArtifactStore {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn open(root: &Utf8Path) -> io::Result<Self> {
        let dir = placesweep_fs::open_root(root)?;
        Self::with_dir(root, dir)
    }

    /// Open the store rooted at an existing directory. A missing root fails
    /// with [`io::ErrorKind::NotFound`] and is not created.
    pub fn open_existing(root: &Utf8Path) -> io::Result<Self> {
        let dir = placesweep_fs::open_existing(root)?;
        Self::with_dir(root, dir)
    }

    fn with_dir(root: &Utf8Path, dir: Dir) -> io::Result<Self> {
        let root = root.canonicalize_utf8()?;
        Ok(Self {
            root,
            dir: Arc::new(dir),
        })
    }

    /// Absolute root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Reference to `key` under this root, whether or not it exists yet.
    #[must_use]
    pub fn artifact_ref(&self, key: &str) -> ArtifactRef {
        ArtifactRef {
            uri: format!("file://{}", self.root.join(key)),
            key: key.to_owned(),
        }
    }

    async fn blocking<T, F>(&self, key: &str, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Dir) -> io::Result<T> + Send + 'static,
    {
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || op(&dir))
            .await
            .map_err(|err| io::Error::other(err.to_string()))
            .and_then(|result| result)
            .map_err(|source| match source.kind() {
                io::ErrorKind::AlreadyExists => StoreError::AlreadyExists {
                    key: key.to_owned(),
                },
                io::ErrorKind::NotFound => StoreError::NotFound {
                    key: key.to_owned(),
                },
                _ => StoreError::Io {
                    key: key.to_owned(),
                    source,
                },
            })
    }
}

fn checked_key(key: &str) -> Result<Utf8PathBuf, StoreError> {
    let path = Utf8PathBuf::from(key);
    if is_contained(&path) {
        Ok(path)
    } else {
        Err(StoreError::InvalidKey {
            key: key.to_owned(),
            reason: "keys must be relative paths without `.` or `..` segments",
        })
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<ArtifactRef, StoreError> {
        let path = checked_key(key)?;
        let body = body.to_vec();
        debug!("writing {} bytes of {content_type} to {key}", body.len());
        self.blocking(key, move |dir| {
            placesweep_fs::write_new_atomic(dir, &path, &body)
        })
        .await?;
        Ok(self.artifact_ref(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = checked_key(key)?;
        self.blocking(key, move |dir| dir.read(&path)).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // Walk the deepest directory the prefix fully names, then filter.
        let base = match prefix.rfind('/') {
            Some(index) => Utf8PathBuf::from(&prefix[..index]),
            None => Utf8PathBuf::new(),
        };
        if !base.as_str().is_empty() && !is_contained(&base) {
            return Err(StoreError::InvalidKey {
                key: prefix.to_owned(),
                reason: "prefixes must be relative paths without `.` or `..` segments",
            });
        }
        let files = self
            .blocking(prefix, move |dir| placesweep_fs::list_files(dir, &base))
            .await?;
        Ok(files
            .iter()
            .map(|path| {
                path.components()
                    .map(|component| component.as_str())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}
