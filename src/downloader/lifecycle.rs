//! Shutdown coordination.

use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::Event;

use super::NovelDownloader;

/// How long shutdown waits for running tasks to reach a chunk boundary
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl NovelDownloader {
    /// Gracefully shut down the downloader
    ///
    /// 1. Stops accepting new tasks and resumes
    /// 2. Signals every running task to stop at its next chunk boundary
    /// 3. Waits (up to 30 seconds) for those tasks to checkpoint and stop
    /// 4. Ends background services and emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.control.accepting_new.store(false, Ordering::SeqCst);

        let handles = self.registry.cancel_running().await;
        tracing::info!(running = handles.len(), "Signaled stop to running tasks");

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, futures::future::join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Task ended abnormally during shutdown");
                    }
                }
                tracing::info!("All running tasks stopped");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for tasks to stop, proceeding with shutdown");
            }
        }

        self.control.shutdown_token.cancel();
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether new tasks are still accepted
    pub fn is_accepting_tasks(&self) -> bool {
        self.control.accepting_new.load(Ordering::SeqCst)
    }

    /// Token cancelled once [`shutdown`](Self::shutdown) has finished
    pub fn shutdown_signal(&self) -> CancellationToken {
        self.control.shutdown_token.clone()
    }
}
