//! Saving and loading a [`VectorIndex`] as a single JSON file.
//!
//! The file records the embedding model and dimension next to every entry's
//! chunk text and metadata, so a loaded index answers queries without the
//! source documents.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::IndexEntry;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    format_version: u32,
    embedding_model: &'a str,
    dimensions: usize,
    built_at: DateTime<Utc>,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct PersistedIndex {
    format_version: u32,
    embedding_model: String,
    dimensions: usize,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

/// Sibling path used while writing, renamed over the real file on success.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl VectorIndex {
    /// Persist the index to `path`.
    ///
    /// The index is written to a temporary sibling file and renamed into
    /// place, so a failure leaves any previous file at `path` untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the file cannot be written.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let body = serde_json::to_vec(&PersistedIndexRef {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: self.embedding_model(),
            dimensions: self.dimensions(),
            built_at: self.built_at(),
            entries: self.entries(),
        })
        .map_err(|e| RagError::Io(std::io::Error::other(e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = staging_path(path);
        if let Err(e) = tokio::fs::write(&staging, &body).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, path).await {
            warn!(path = %path.display(), error = %e, "failed to move index into place");
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        info!(
            path = %path.display(),
            entries = self.len(),
            bytes = body.len(),
            "saved index"
        );
        Ok(())
    }

    /// Load an index previously written by [`save`](VectorIndex::save).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexNotFound`] if nothing exists at `path`, and
    /// [`RagError::IndexCorrupt`] if the file cannot be read, parsed, has an
    /// unknown format version, or holds inconsistent embeddings.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let corrupt =
            |message: String| RagError::IndexCorrupt { path: path.to_path_buf(), message };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RagError::IndexNotFound { path: Some(path.to_path_buf()) });
            }
            Err(e) => return Err(corrupt(format!("unreadable: {e}"))),
        };

        let persisted: PersistedIndex =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("invalid JSON: {e}")))?;

        if persisted.format_version != INDEX_FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {} (expected {INDEX_FORMAT_VERSION})",
                persisted.format_version
            )));
        }

        let index = VectorIndex::from_parts(
            persisted.embedding_model,
            persisted.dimensions,
            persisted.built_at,
            persisted.entries,
        )
        .map_err(|e| corrupt(e.to_string()))?;

        debug!(
            path = %path.display(),
            entries = index.len(),
            model = index.embedding_model(),
            "loaded index"
        );
        Ok(index)
    }
}
