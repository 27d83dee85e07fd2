//! Background services. The janitor expires finished tasks.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use crate::types::{Event, TaskId};

use super::NovelDownloader;

/// How long the janitor waits for a book's lock before keeping its artifact
const BOOK_LOCK_WAIT: Duration = Duration::from_secs(1);

impl NovelDownloader {
    /// Start the janitor background task
    ///
    /// Every `retention.cleanup_interval` it removes tasks that reached a
    /// terminal state more than `retention.task_retention` ago, deleting their
    /// artifact files unless another task still targets the same book. The
    /// loop ends on [`shutdown`](Self::shutdown).
    pub fn start_janitor(&self) -> tokio::task::JoinHandle<()> {
        let downloader = self.clone();
        let interval = self.config.retention.cleanup_interval;
        let shutdown = self.control.shutdown_token.clone();

        tracing::info!(
            interval_secs = interval.as_secs(),
            retention_secs = self.config.retention.task_retention.as_secs(),
            "Janitor started"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        downloader.cleanup_expired_tasks(Utc::now()).await;
                    }
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Janitor stopped");
                        break;
                    }
                }
            }
        })
    }

    /// Remove terminal tasks whose retention window ended before `now`
    ///
    /// Returns how many tasks were removed.
    pub async fn cleanup_expired_tasks(&self, now: DateTime<Utc>) -> usize {
        let retention = self.config.retention.task_retention;
        let expired = self
            .registry
            .terminal_where(|task| is_expired(task.finished_at, now, retention))
            .await;

        let mut removed = 0;
        for id in expired {
            let Some(entry) = self.registry.remove(&id).await else {
                continue;
            };
            removed += 1;

            if let Some(path) = &entry.task.artifact_path {
                self.remove_expired_artifact(&id, &entry.task.book_id, path).await;
            }

            tracing::info!(task_id = %id, "Expired task removed");
            self.emit_event(Event::TaskRemoved { id });
        }
        removed
    }

    /// Delete an expired task's artifact unless the book is still in use
    ///
    /// Every task for a book writes the same file, so the file stays while
    /// another registered task targets the book. The book lock keeps a run
    /// from starting between that check and the delete.
    async fn remove_expired_artifact(&self, id: &TaskId, book_id: &str, path: &Path) {
        let book_lock = self.control.book_lock(book_id).await;
        let in_use = match tokio::time::timeout(BOOK_LOCK_WAIT, book_lock.lock()).await {
            Ok(_guard) => {
                if self.registry.has_book(book_id).await {
                    true
                } else {
                    delete_artifact(id, path).await;
                    false
                }
            }
            Err(_) => true,
        };
        self.control.release_book_lock(book_id, book_lock).await;

        if in_use {
            tracing::debug!(
                task_id = %id,
                book_id,
                path = %path.display(),
                "Artifact kept, book still has registered tasks"
            );
        }
    }
}

async fn delete_artifact(id: &TaskId, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                task_id = %id,
                path = %path.display(),
                error = %e,
                "Failed to delete expired artifact"
            );
        }
    }
}

fn is_expired(finished_at: Option<DateTime<Utc>>, now: DateTime<Utc>, retention: Duration) -> bool {
    let Some(finished_at) = finished_at else {
        return false;
    };
    match chrono::Duration::from_std(retention) {
        Ok(retention) => now - finished_at > retention,
        Err(_) => false,
    }
}
