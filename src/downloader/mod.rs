//! Core downloader implementation split into focused submodules.
//!
//! The `NovelDownloader` struct and its methods are organized by domain:
//! - [`registry`] - Shared task registry with atomic per-task updates
//! - [`control`] - Collaborator surface (create/status/stop/resume/artifacts)
//! - [`download_task`] - Chunked chapter download for one task
//! - [`services`] - Janitor for expired tasks
//! - [`lifecycle`] - Shutdown coordination

mod control;
mod download_task;
mod lifecycle;
mod registry;
mod services;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use control::Artifact;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio_util::sync::CancellationToken;

use crate::acquisition::{AcquisitionClient, ContentProvider};
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::Event;

use registry::TaskRegistry;

/// Per-book locks so two tasks never append to the same artifact at once
pub(crate) type BookLocks = Arc<tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Scheduling and shutdown state shared by every task
#[derive(Clone)]
pub(crate) struct ControlState {
    /// Bounds how many tasks download at the same time
    pub(crate) concurrent_limit: Arc<tokio::sync::Semaphore>,
    /// Serializes tasks targeting the same book
    pub(crate) book_locks: BookLocks,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled during shutdown to end background services
    pub(crate) shutdown_token: CancellationToken,
}

impl ControlState {
    /// The lock serializing work on `book_id`, registered while anyone holds it
    pub(crate) async fn book_lock(&self, book_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.book_locks.lock().await;
        locks
            .entry(book_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Give back a lock from [`book_lock`](Self::book_lock), dropping the
    /// map entry once nobody else holds or awaits it
    pub(crate) async fn release_book_lock(&self, book_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        // clones are only handed out under the map lock, so the count is stable here
        let mut locks = self.book_locks.lock().await;
        drop(lock);
        if locks
            .get(book_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(book_id);
        }
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct NovelDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Every task created by this downloader
    pub(crate) registry: TaskRegistry,
    /// Where chapter lists, metadata and chapter bodies come from
    pub(crate) provider: Arc<dyn ContentProvider>,
    /// Resume markers under the download directory
    pub(crate) checkpoints: CheckpointStore,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Scheduling and shutdown state
    pub(crate) control: ControlState,
}

impl NovelDownloader {
    /// Create a downloader talking to the configured origin service and mirrors
    pub async fn new(config: Config) -> Result<Self> {
        let provider = AcquisitionClient::new(&config)?;
        Self::with_provider(config, Arc::new(provider)).await
    }

    /// Create a downloader with a custom [`ContentProvider`]
    ///
    /// Validates the configuration and makes sure the download directory exists.
    pub async fn with_provider(config: Config, provider: Arc<dyn ContentProvider>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        // Buffer of 1000 events; slower subscribers see RecvError::Lagged
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let checkpoints = CheckpointStore::new(
            config.download.download_dir.clone(),
            config.retention.checkpoint_max_age,
        );

        let control = ControlState {
            concurrent_limit: Arc::new(tokio::sync::Semaphore::new(
                config.download.max_concurrent_tasks,
            )),
            book_locks: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        };

        tracing::info!(
            download_dir = %config.download.download_dir.display(),
            chunk_size = config.download.chunk_size,
            mirrors = config.mirrors.len(),
            "Downloader initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            registry: TaskRegistry::new(),
            provider,
            checkpoints,
            event_tx,
            control,
        })
    }

    /// Subscribe to task events
    ///
    /// Each subscriber receives every event independently. A subscriber that
    /// falls more than 1000 events behind gets `RecvError::Lagged`.
    ///
    /// ```no_run
    /// use novel_dl::{Config, NovelDownloader};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let downloader = NovelDownloader::new(Config::default()).await?;
    /// let mut events = downloader.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "task event");
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Send an event to all subscribers; dropped silently when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
