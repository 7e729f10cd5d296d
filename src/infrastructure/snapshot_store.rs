//! Persisted player snapshot
//!
//! The cache file is a single JSON object `{nickname: record}` written
//! wholesale at the end of every completed run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::Snapshot;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot file {path:?} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// JSON file holding the snapshot of the previous run
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where a corrupt cache file is copied before starting empty
    pub fn backup_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, ".corrupted")
    }

    /// Load the previous snapshot, falling back to an empty one.
    ///
    /// A missing file is the normal first-run case. Any other problem is
    /// logged; a corrupt file is backed up first so it is not lost on the
    /// next save.
    pub async fn load(&self) -> Snapshot {
        match self.read().await {
            Ok(Some(snapshot)) => {
                info!("Loaded {} cached players from {:?}", snapshot.len(), self.path);
                snapshot
            }
            Ok(None) => {
                info!("No cache file at {:?}, starting with an empty snapshot", self.path);
                Snapshot::new()
            }
            Err(SnapshotError::Corrupt { path, source }) => {
                warn!("⚠️  Cache file {:?} is corrupt: {}", path, source);
                let backup = self.backup_path();
                match fs::copy(&self.path, &backup).await {
                    Ok(_) => info!("Backed up corrupt cache to: {:?}", backup),
                    Err(e) => warn!("Failed to back up corrupt cache: {}", e),
                }
                Snapshot::new()
            }
            Err(e) => {
                warn!("⚠️  Could not read cache file: {}", e);
                Snapshot::new()
            }
        }
    }

    /// Read and decode the cache file; `Ok(None)` when it does not exist
    pub async fn read(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| SnapshotError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Replace the cache file atomically: write a sibling temp file, then rename
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let content = to_pretty_json(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| SnapshotError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp_path = sibling_with_suffix(&self.path, ".tmp");
        fs::write(&temp_path, content)
            .await
            .map_err(|source| SnapshotError::Io {
                path: temp_path.clone(),
                source,
            })?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|source| SnapshotError::Io {
                path: self.path.clone(),
                source,
            })?;

        info!("Saved {} players to {:?}", snapshot.len(), self.path);
        Ok(())
    }
}

/// Pretty JSON with a 4-space indent, matching the historical file layout
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
