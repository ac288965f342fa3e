//! On-disk layout of generated streams.
//!
//! ```text
//! <root>/<media_id>/<quality>/index.m3u8
//! <root>/<media_id>/<quality>/seg_000.ts
//! ```
//!
//! Nothing under the root survives a restart: [`SegmentStore::reset_all`]
//! empties it before the server starts accepting requests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cactustv_av::MANIFEST_NAME;
use cactustv_common::paths::require_safe_component;
use cactustv_common::{MediaId, Result, StreamKey};

/// How often directory creation is retried when a concurrent reclaim removes
/// a parent directory underneath it.
const CREATE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct SegmentStore {
    root: PathBuf,
}

impl SegmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every quality of one media item.
    pub fn media_dir(&self, media_id: &MediaId) -> PathBuf {
        self.root.join(media_id.as_str())
    }

    /// Directory for one session. Pure path computation.
    pub fn quality_dir(&self, key: &StreamKey) -> PathBuf {
        self.media_dir(&key.media_id).join(&key.quality)
    }

    /// Session directory, created on demand.
    ///
    /// A reclaim of the same media id may delete the tree while it is being
    /// created; `NotFound` is retried rather than reported.
    pub async fn output_dir(&self, key: &StreamKey) -> Result<PathBuf> {
        let dir = self.quality_dir(key);
        let mut attempt = 1;
        loop {
            match tokio::fs::create_dir_all(&dir).await {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == ErrorKind::NotFound && attempt < CREATE_ATTEMPTS => {
                    tracing::debug!(
                        dir = %dir.display(),
                        attempt,
                        "Output directory vanished during creation, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn manifest_path(&self, key: &StreamKey) -> PathBuf {
        self.quality_dir(key).join(MANIFEST_NAME)
    }

    /// Path of a named file inside a session directory.
    ///
    /// `name` must be a single path component.
    pub fn segment_path(&self, key: &StreamKey, name: &str) -> Result<PathBuf> {
        let name = require_safe_component("segment name", name)?;
        Ok(self.quality_dir(key).join(name))
    }

    /// Whether `path` exists. Errors while checking count as "not yet".
    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Remove every quality directory of a media item.
    ///
    /// Best-effort: failures are logged and swallowed.
    pub async fn reclaim(&self, media_id: &MediaId) {
        let dir = self.media_dir(media_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::debug!(media_id = %media_id, "Reclaimed stream directory");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    media_id = %media_id,
                    dir = %dir.display(),
                    error = %e,
                    "Failed to reclaim stream directory"
                );
            }
        }
    }

    /// Empty the root directory, creating it if needed.
    pub async fn reset_all(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;
        tracing::info!(root = %self.root.display(), "Segment store reset");
        Ok(())
    }
}
