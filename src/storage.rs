//! Transient scratch storage for one batch's staged output files.
//!
//! ## Why a handle type?
//!
//! Cleanup must run on every exit path: early validation returns, per-file
//! failures, archive errors, client disconnects that drop the handler future
//! mid-await. Tying the folder's lifetime to a value gives us that for free:
//! [`BatchDir::release`] is the explicit, idempotent cleanup call, and `Drop`
//! removes the folder as a last resort when release was never reached.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Generate a collision-resistant batch identifier.
///
/// The original folder-naming scheme was the arrival timestamp alone, which
/// collides when two requests land in the same millisecond. A short random
/// suffix closes that window without making the id unreadable in logs.
pub fn new_batch_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", millis, &suffix[..8])
}

/// An exclusively owned scratch folder for one batch's output files.
///
/// Created by [`BatchDir::allocate`]; removed by [`BatchDir::release`] (or
/// `Drop`). No two concurrent batches share a folder because the batch id
/// is unique per allocation.
#[derive(Debug)]
pub struct BatchDir {
    batch_id: String,
    path: PathBuf,
    released: bool,
}

impl BatchDir {
    /// Create `<root>/<batch_id>` and return the owning handle.
    ///
    /// The id is supplied by the caller so one identifier can name the
    /// batch, its scratch folder, and the download archive; use
    /// [`new_batch_id`] to mint one.
    pub async fn allocate(
        root: impl AsRef<Path>,
        batch_id: impl Into<String>,
    ) -> Result<Self, ConvertError> {
        let batch_id = batch_id.into();
        let path = root.as_ref().join(&batch_id);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| ConvertError::Storage {
                path: path.display().to_string(),
                source: e,
            })?;
        debug!("Allocated batch folder: {}", path.display());
        Ok(Self {
            batch_id,
            path,
            released: false,
        })
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one staged output file into the batch folder.
    ///
    /// `name` is reduced to its final path component first; a crafted name
    /// must not escape the folder.
    pub async fn persist(&self, name: &str, bytes: &[u8]) -> Result<(), ConvertError> {
        let safe = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("unnamed");
        let file_path = self.path.join(safe);
        tokio::fs::write(&file_path, bytes)
            .await
            .map_err(|e| ConvertError::Storage {
                path: file_path.display().to_string(),
                source: e,
            })
    }

    /// Read back every staged file as `(name, bytes)` pairs, sorted by name
    /// for deterministic archive ordering.
    pub async fn read_all(&self) -> Result<Vec<(String, Vec<u8>)>, ConvertError> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| ConvertError::Storage {
                path: self.path.display().to_string(),
                source: e,
            })?;

        while let Some(entry) = dir.next_entry().await.map_err(|e| ConvertError::Storage {
            path: self.path.display().to_string(),
            source: e,
        })? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let bytes =
                tokio::fs::read(entry.path())
                    .await
                    .map_err(|e| ConvertError::Storage {
                        path: entry.path().display().to_string(),
                        source: e,
                    })?;
            entries.push((name, bytes));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Remove the batch folder and everything in it.
    ///
    /// Idempotent: releasing twice (or releasing after the folder vanished
    /// out from under us) is not an error.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => debug!("Released batch folder: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to release batch folder {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for BatchDir {
    fn drop(&mut self) {
        if !self.released {
            // Blocking removal is acceptable here: the folder holds at most
            // one batch's worth of files, and this path only runs when the
            // caller skipped the async release (e.g. a dropped request).
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        "Failed to clean up batch folder {} on drop: {}",
                        self.path.display(),
                        e
                    );
                }
            }
        }
    }
}
