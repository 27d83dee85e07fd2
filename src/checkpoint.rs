//! Durable per-book resume markers
//!
//! A checkpoint records how many leading chapters of a book have been settled
//! and when. It lives at `{download_dir}/{book_id}_progress.json` as
//! `{"downloaded": n, "timestamp": unix_seconds, "file_name": "..."}`, where
//! `file_name` names the artifact being appended to. Readers ignore checkpoints
//! older than the configured window but never delete them; only a completed
//! download removes its checkpoint.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;

/// Resume marker for one book
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressCheckpoint {
    /// Leading chapters already settled
    pub downloaded: usize,
    /// Unix time of the last write, in (possibly fractional) seconds
    #[serde(default)]
    pub timestamp: f64,
    /// Artifact file inside the book directory that the chapters went into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl ProgressCheckpoint {
    /// Checkpoint stamped with the current time
    pub fn now(downloaded: usize, file_name: Option<&str>) -> Self {
        Self {
            downloaded,
            timestamp: unix_now(),
            file_name: file_name.map(str::to_string),
        }
    }

    /// Whether the checkpoint is still usable at `now` (seconds since epoch)
    pub fn is_live_at(&self, now: f64, max_age: Duration) -> bool {
        now - self.timestamp < max_age.as_secs_f64()
    }
}

/// Reads and writes checkpoints under the download directory
#[derive(Clone, Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    max_age: Duration,
}

impl CheckpointStore {
    /// Create a store rooted at `dir`, honoring checkpoints younger than `max_age`
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    /// Location of the checkpoint file for a book
    pub fn path_for(&self, book_id: &str) -> PathBuf {
        self.dir.join(format!("{book_id}_progress.json"))
    }

    /// Load a live checkpoint, or `None` if it is missing, unreadable or stale
    pub async fn load(&self, book_id: &str) -> Option<ProgressCheckpoint> {
        self.load_at(book_id, unix_now()).await
    }

    /// Like [`load`](Self::load), evaluating staleness at `now` (seconds since epoch)
    pub async fn load_at(&self, book_id: &str, now: f64) -> Option<ProgressCheckpoint> {
        let path = self.path_for(book_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(book_id, path = %path.display(), error = %e, "failed to read checkpoint");
                return None;
            }
        };

        let checkpoint: ProgressCheckpoint = match serde_json::from_slice(&bytes) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(book_id, error = %e, "ignoring malformed checkpoint");
                return None;
            }
        };

        if !checkpoint.is_live_at(now, self.max_age) {
            tracing::debug!(
                book_id,
                age_secs = now - checkpoint.timestamp,
                "ignoring stale checkpoint"
            );
            return None;
        }

        Some(checkpoint)
    }

    /// Persist `downloaded` settled chapters for a book, stamped now
    ///
    /// Written to a temporary file and renamed so readers never see a
    /// half-written checkpoint.
    pub async fn save(&self, book_id: &str, downloaded: usize, file_name: Option<&str>) -> Result<()> {
        let checkpoint = ProgressCheckpoint::now(downloaded, file_name);
        let path = self.path_for(book_id);
        let tmp = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&checkpoint)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(book_id, downloaded, "checkpoint saved");
        Ok(())
    }

    /// Delete the checkpoint for a book; a missing file is not an error
    pub async fn remove(&self, book_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(book_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Directory checkpoints are stored in
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
