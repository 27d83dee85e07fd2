//! Chunked chapter download -- fixed-size ordered chunks, concurrent inside a
//! chunk, strictly sequential across chunks.

use futures::future::join_all;

use crate::types::{Chapter, ChapterContent, Event};

use super::context::{ArtifactWriter, DownloadTaskContext};

/// How the chunk loop ended
pub(super) enum ChunkOutcome {
    /// Every chapter settled
    Finished {
        /// Chapters no source could deliver
        failed: usize,
    },
    /// A stop request was observed at a chunk boundary
    Stopped {
        /// Leading chapters settled before stopping
        done: usize,
    },
    /// Writing the artifact failed
    Failed(String),
}

/// Download `chapters[skip..]` chunk by chunk
///
/// The cancellation token is checked once before each chunk. Within a chunk
/// all fetches run concurrently on this task and the results are appended in
/// chapter order once every fetch has settled. The checkpoint advances after
/// every chunk.
pub(super) async fn download_chunks(
    ctx: &DownloadTaskContext,
    chapters: &[Chapter],
    skip: usize,
    artifact: &ArtifactWriter,
) -> ChunkOutcome {
    let total = chapters.len();
    let chunk_size = ctx.config.download.chunk_size.max(1);
    let mut done = skip;
    let mut failed = ctx
        .registry
        .snapshot(&ctx.id)
        .await
        .map(|t| t.chapters_failed)
        .unwrap_or_default();

    for chunk in chapters[skip..].chunks(chunk_size) {
        if ctx.cancel_token.is_cancelled() {
            save_checkpoint(ctx, done, artifact).await;
            return ChunkOutcome::Stopped { done };
        }

        let contents = join_all(chunk.iter().map(|chapter| ctx.provider.fetch_chapter(chapter))).await;
        let settled: Vec<(&Chapter, ChapterContent)> = chunk.iter().zip(contents).collect();

        for (chapter, content) in &settled {
            if !content.is_present() {
                failed += 1;
                tracing::warn!(
                    task_id = %ctx.id,
                    chapter_id = %chapter.id,
                    ordinal = chapter.ordinal,
                    "Chapter unavailable from all sources, skipped"
                );
                ctx.emit(Event::ChapterFailed {
                    id: ctx.id.clone(),
                    chapter_id: chapter.id.clone(),
                    ordinal: chapter.ordinal,
                });
            }
        }

        if let Err(e) = artifact.append(&settled).await {
            return ChunkOutcome::Failed(format!(
                "cannot write {}: {e}",
                artifact.path().display()
            ));
        }

        done += chunk.len();
        save_checkpoint(ctx, done, artifact).await;

        let percent = ctx.record_progress(done, total, failed).await;
        ctx.emit(Event::Progress {
            id: ctx.id.clone(),
            percent,
            completed: done,
            total,
        });
        tracing::debug!(task_id = %ctx.id, completed = done, total, "Chunk settled");
    }

    ChunkOutcome::Finished { failed }
}

async fn save_checkpoint(ctx: &DownloadTaskContext, done: usize, artifact: &ArtifactWriter) {
    if let Err(e) = ctx
        .checkpoints
        .save(&ctx.book_id, done, artifact.file_name())
        .await
    {
        tracing::warn!(
            task_id = %ctx.id,
            book_id = %ctx.book_id,
            error = %e,
            "Failed to save checkpoint"
        );
    }
}
