//! Download task context: shared state, status transitions and the output artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::acquisition::ContentProvider;
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::types::{BookInfo, Chapter, ChapterContent, Event, TaskId, TaskState};

use super::super::ControlState;
use super::super::registry::TaskRegistry;

/// Shared context for one run of a download task
pub(crate) struct DownloadTaskContext {
    pub(crate) id: TaskId,
    pub(crate) book_id: String,
    pub(crate) registry: TaskRegistry,
    pub(crate) provider: Arc<dyn ContentProvider>,
    pub(crate) checkpoints: CheckpointStore,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) control: ControlState,
    pub(crate) cancel_token: CancellationToken,
}

impl DownloadTaskContext {
    pub(super) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(super) async fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.registry
            .update(&self.id, |task| task.message = message)
            .await;
    }

    /// Record settled chapters and the derived percentage in one update
    pub(super) async fn record_progress(&self, done: usize, total: usize, failed: usize) -> u8 {
        let percent = progress_percent(done, total);
        self.registry
            .update(&self.id, |task| {
                task.chapters_done = done;
                task.chapters_total = total;
                task.chapters_failed = failed;
                // never move backwards while running
                task.progress = task.progress.max(percent);
                task.message = format!("Downloading: {done}/{total} chapters");
            })
            .await;
        percent
    }

    /// Transition to `error` with the cause in the message
    pub(super) async fn mark_failed(&self, cause: &str) {
        tracing::error!(task_id = %self.id, book_id = %self.book_id, error = cause, "Download failed");
        self.registry
            .update(&self.id, |task| {
                task.state = TaskState::Error;
                task.message = format!("Download failed: {cause}");
                task.finished_at = Some(chrono::Utc::now());
            })
            .await;
        self.emit(Event::Failed {
            id: self.id.clone(),
            error: cause.to_string(),
        });
    }

    /// Transition to `stopped` after the checkpoint has been written
    pub(super) async fn mark_stopped(&self, done: usize) {
        tracing::info!(task_id = %self.id, book_id = %self.book_id, completed = done, "Download stopped");
        self.registry
            .update(&self.id, |task| {
                task.state = TaskState::Stopped;
                task.message = "Download stopped".to_string();
            })
            .await;
        self.emit(Event::Stopped {
            id: self.id.clone(),
            completed: done,
        });
    }
}

/// `floor(done * 100 / total)`, 0 for an empty book
pub(crate) fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = done.min(total) * 100 / total;
    percent as u8
}

/// Replace characters that are not allowed in file names on common platforms
pub(crate) fn sanitize_file_name(title: &str, fallback: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// The book's `.txt` artifact, written header first and then appended to
pub(crate) struct ArtifactWriter {
    path: PathBuf,
}

impl ArtifactWriter {
    /// Artifact for `info` inside `book_dir`
    pub(super) fn new(book_dir: &Path, info: &BookInfo, book_id: &str) -> Self {
        let file_name = format!("{}.txt", sanitize_file_name(&info.title, book_id));
        Self {
            path: book_dir.join(file_name),
        }
    }

    /// Artifact to keep appending to when resuming from a checkpoint
    ///
    /// Prefers the file the checkpoint recorded, then a file named after the
    /// freshly resolved title, then any `.txt` already in `book_dir`, so a
    /// resume never starts a second, headerless file for the same book.
    pub(super) async fn resume(
        book_dir: &Path,
        recorded: Option<&str>,
        info: &BookInfo,
        book_id: &str,
    ) -> Self {
        let recorded = recorded
            .and_then(|name| Path::new(name).file_name())
            .map(|name| book_dir.join(name))
            .filter(|path| path.is_file());
        if let Some(path) = recorded {
            return Self { path };
        }

        let fresh = Self::new(book_dir, info, book_id);
        if fresh.path.is_file() {
            return fresh;
        }
        match find_text_file(book_dir).await {
            Some(path) => Self { path },
            None => fresh,
        }
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }

    /// File name recorded in checkpoints
    pub(super) fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Start the artifact over with just the header
    pub(super) async fn write_header(&self, info: &BookInfo) -> std::io::Result<()> {
        tokio::fs::write(&self.path, info.header()).await
    }

    /// Append chapter blocks in the given order, skipping absent chapters
    pub(super) async fn append(&self, chapters: &[(&Chapter, ChapterContent)]) -> std::io::Result<()> {
        let mut block = String::new();
        for (chapter, content) in chapters {
            if !content.is_present() {
                continue;
            }
            block.push_str(&chapter_block(chapter, content));
        }
        if block.is_empty() {
            return Ok(());
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await
    }
}

/// `{label} {title}` (or just the label), the body, then a blank line
pub(crate) fn chapter_block(chapter: &Chapter, content: &ChapterContent) -> String {
    let heading = match content.title.as_deref().filter(|t| !t.is_empty()) {
        Some(title) => format!("{} {}", chapter.label(), title),
        None => chapter.label(),
    };
    format!(
        "{heading}\n{}\n\n",
        content.body.as_deref().unwrap_or_default()
    )
}

/// First `.txt` file in `dir` by name, if any
pub(crate) async fn find_text_file(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut found = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "txt") && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    found.into_iter().next()
}
