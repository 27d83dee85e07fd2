//! Result evaluation and final task state.

use crate::types::{Event, TaskState};

use super::chunking::ChunkOutcome;
use super::context::{ArtifactWriter, DownloadTaskContext};

/// Move the task to its end-of-run state
///
/// - `Finished` completes the task, publishes the artifact path and discards
///   the checkpoint
/// - `Stopped` leaves the checkpoint in place for a later resume
/// - `Failed` marks the task as errored
pub(super) async fn finalize_download(
    ctx: &DownloadTaskContext,
    outcome: ChunkOutcome,
    artifact: &ArtifactWriter,
) {
    match outcome {
        ChunkOutcome::Finished { failed } => complete(ctx, failed, artifact).await,
        ChunkOutcome::Stopped { done } => ctx.mark_stopped(done).await,
        ChunkOutcome::Failed(cause) => ctx.mark_failed(&cause).await,
    }
}

async fn complete(ctx: &DownloadTaskContext, failed: usize, artifact: &ArtifactWriter) {
    if let Err(e) = ctx.checkpoints.remove(&ctx.book_id).await {
        tracing::warn!(book_id = %ctx.book_id, error = %e, "Failed to remove checkpoint");
    }

    let path = artifact.path().to_path_buf();
    let message = if failed == 0 {
        "Download complete".to_string()
    } else {
        format!("Download complete ({failed} chapters unavailable)")
    };

    ctx.registry
        .update(&ctx.id, |task| {
            task.state = TaskState::Completed;
            task.progress = 100;
            task.chapters_done = task.chapters_total;
            task.chapters_failed = failed;
            task.message = message;
            task.artifact_path = Some(path.clone());
            task.finished_at = Some(chrono::Utc::now());
        })
        .await;

    tracing::info!(
        task_id = %ctx.id,
        book_id = %ctx.book_id,
        path = %path.display(),
        chapters_failed = failed,
        "Download complete"
    );

    ctx.emit(Event::Completed {
        id: ctx.id.clone(),
        path,
        chapters_failed: failed,
    });
}
