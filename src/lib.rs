//! # novel-dl
//!
//! Resumable download engine for chapterized novels served by an encrypted
//! origin service, with unauthenticated mirrors as fallback.
//!
//! A download task fetches a book's chapters in fixed-size chunks, decrypts
//! and normalizes each chapter, appends the results in order to a single
//! `.txt` file and records a checkpoint after every chunk. Stopping takes
//! effect at the next chunk boundary; resuming continues from the checkpoint.
//!
//! ## Quick Start
//!
//! ```no_run
//! use novel_dl::{Config, NovelDownloader, TaskState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = NovelDownloader::new(Config::default()).await?;
//!
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let id = downloader.create_task("7143038691944959011").await?;
//!     let status = downloader.get_task_status(&id).await?;
//!     assert_eq!(status.state, TaskState::Running);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Origin service, mirror and catalog clients
pub mod acquisition;
/// REST API module
pub mod api;
/// Resume checkpoints
pub mod checkpoint;
/// Configuration types
pub mod config;
/// Session key exchange and chapter payload decryption
pub mod crypto;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Chapter text normalization
pub mod normalize;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use acquisition::{AcquisitionClient, ContentProvider};
pub use config::{Config, MirrorConfig};
pub use downloader::{Artifact, NovelDownloader};
pub use error::{AcquisitionError, ApiError, Error, ErrorDetail, Result, TaskError, ToHttpStatus};
pub use types::{BookInfo, Chapter, ChapterContent, DownloadTask, Event, TaskId, TaskState};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to Ctrl+C if
///   the handlers cannot be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use novel_dl::{Config, NovelDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = NovelDownloader::new(Config::default()).await?;
///     downloader.start_janitor();
///     downloader.spawn_api_server();
///
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: NovelDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, using ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
