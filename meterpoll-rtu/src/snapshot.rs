//! Snapshot persistence.
//!
//! The snapshot is a single compact JSON file, replaced every cycle. Writes
//! go to a sibling `.tmp` file which is then renamed over the snapshot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::document::Document;

/// Errors raised while reading or writing snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Storage unavailable at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One entry of a persisted snapshot, as read back from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub value: f64,
    pub unit: String,
}

/// Parse snapshot text into its entries.
pub fn parse_snapshot(content: &str) -> Result<HashMap<String, SnapshotEntry>, SnapshotError> {
    Ok(serde_json::from_str(content)?)
}

/// Writes documents to a fixed snapshot path.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make sure the snapshot directory exists.
    pub async fn prepare(&self) -> Result<(), SnapshotError> {
        let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(());
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| SnapshotError::Storage {
                path: dir.to_path_buf(),
                source,
            })
    }

    /// Replace the snapshot with `document`. Returns the number of bytes written.
    pub async fn write(&self, document: &Document) -> Result<usize, SnapshotError> {
        write_json_atomic(&self.path, document).await
    }

    /// Read the raw content of the previous snapshot, if there is one.
    pub async fn read_back(&self) -> Result<Option<String>, SnapshotError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SnapshotError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Serialize `value` as compact JSON and atomically replace `path` with it.
pub async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<usize, SnapshotError> {
    let payload = serde_json::to_vec(value)?;
    let tmp = temp_path(path);

    tokio::fs::write(&tmp, &payload)
        .await
        .map_err(|source| SnapshotError::Write {
            path: tmp.clone(),
            source,
        })?;

    if let Err(source) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!(path = %path.display(), bytes = payload.len(), "Wrote JSON file");
    Ok(payload.len())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
