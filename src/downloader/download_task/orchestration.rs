//! Download task orchestration, the top-level lifecycle of a single run.

use std::sync::Arc;

use crate::error::Error;
use crate::types::BookInfo;

use super::chunking::download_chunks;
use super::context::{ArtifactWriter, DownloadTaskContext, progress_percent};
use super::finalization::finalize_download;

/// Core download task -- drives one run of a task until it completes,
/// stops at a chunk boundary or fails.
///
/// Phases:
/// 1. Wait for the book lock and a download slot (a stop request ends the wait)
/// 2. Resolve the chapter list and book metadata
/// 3. Prepare the book directory and artifact, honoring a live checkpoint
/// 4. Download the remaining chapters chunk by chunk
/// 5. Finalize the task state
///
/// The book's lock entry is dropped once no other run holds or awaits it.
pub(crate) async fn run_download_task(ctx: DownloadTaskContext) {
    let book_lock = ctx.control.book_lock(&ctx.book_id).await;
    run_with_book_lock(&ctx, &book_lock).await;
    ctx.control.release_book_lock(&ctx.book_id, book_lock).await;
}

async fn run_with_book_lock(ctx: &DownloadTaskContext, book_lock: &Arc<tokio::sync::Mutex<()>>) {
    // Phase 1: book lock, then a concurrency slot
    let _book_guard = match book_lock.try_lock() {
        Ok(guard) => guard,
        Err(_) => {
            ctx.set_message("Waiting for another task on this book...").await;
            tokio::select! {
                guard = book_lock.lock() => guard,
                _ = ctx.cancel_token.cancelled() => {
                    stop_before_start(ctx).await;
                    return;
                }
            }
        }
    };

    let _permit = tokio::select! {
        permit = ctx.control.concurrent_limit.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                ctx.mark_failed(&Error::ShuttingDown.to_string()).await;
                return;
            }
        },
        _ = ctx.cancel_token.cancelled() => {
            stop_before_start(ctx).await;
            return;
        }
    };

    tracing::info!(task_id = %ctx.id, book_id = %ctx.book_id, "Download started");

    // Phase 2: chapter list and metadata
    let chapters = match ctx.provider.chapter_list(&ctx.book_id).await {
        Ok(chapters) if chapters.is_empty() => {
            ctx.mark_failed(&format!("no chapters found for book {}", ctx.book_id))
                .await;
            return;
        }
        Ok(chapters) => chapters,
        Err(e) => {
            ctx.mark_failed(&e.to_string()).await;
            return;
        }
    };
    let total = chapters.len();

    let (info, info_known) = match ctx.provider.book_info(&ctx.book_id).await {
        Some(info) => (info, true),
        None => {
            tracing::warn!(book_id = %ctx.book_id, "Book metadata unavailable, using placeholders");
            (BookInfo::unknown(&ctx.book_id), false)
        }
    };

    // Phase 3: directory, artifact header, checkpoint
    let book_dir = ctx.config.download.download_dir.join(&ctx.book_id);
    if let Err(e) = tokio::fs::create_dir_all(&book_dir).await {
        ctx.mark_failed(&format!(
            "cannot create directory {}: {e}",
            book_dir.display()
        ))
        .await;
        return;
    }

    let (artifact, skip) = match ctx.checkpoints.load(&ctx.book_id).await {
        Some(checkpoint) => {
            let skip = checkpoint.downloaded.min(total);
            let artifact = ArtifactWriter::resume(
                &book_dir,
                checkpoint.file_name.as_deref(),
                &info,
                &ctx.book_id,
            )
            .await;
            tracing::info!(
                task_id = %ctx.id,
                book_id = %ctx.book_id,
                resume_from = skip + 1,
                path = %artifact.path().display(),
                "Resuming from checkpoint"
            );
            (artifact, skip)
        }
        None => {
            let artifact = ArtifactWriter::new(&book_dir, &info, &ctx.book_id);
            if let Err(e) = artifact.write_header(&info).await {
                ctx.mark_failed(&format!(
                    "cannot write {}: {e}",
                    artifact.path().display()
                ))
                .await;
                return;
            }
            (artifact, 0)
        }
    };

    ctx.registry
        .update(&ctx.id, |task| {
            // placeholders never replace a title an earlier run resolved
            if info_known || task.book_title.is_none() {
                task.book_title = Some(info.title.clone());
            }
            task.chapters_total = total;
            task.chapters_done = skip;
            task.progress = task.progress.max(progress_percent(skip, total));
            task.message = format!("Downloading: {skip}/{total} chapters");
        })
        .await;

    // Phase 4: chunked download
    let outcome = download_chunks(ctx, &chapters, skip, &artifact).await;

    // Phase 5: finalize
    finalize_download(ctx, outcome, &artifact).await;
}

/// Stop requested before any chapter work began; the checkpoint is untouched
async fn stop_before_start(ctx: &DownloadTaskContext) {
    let done = ctx
        .registry
        .snapshot(&ctx.id)
        .await
        .map(|t| t.chapters_done)
        .unwrap_or_default();
    ctx.mark_stopped(done).await;
}
