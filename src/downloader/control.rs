//! Task control: create, status, stop, resume and artifact access.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result, TaskError};
use crate::types::{DownloadTask, Event, TaskId, TaskState};

use super::NovelDownloader;
use super::download_task::{DownloadTaskContext, find_text_file, run_download_task};

/// An opened artifact file, ready to be streamed to a caller
#[derive(Debug)]
pub struct Artifact {
    /// Location on disk
    pub path: PathBuf,
    /// File name suggested to the caller
    pub file_name: String,
    /// Size in bytes when opened
    pub len: u64,
    /// Open handle positioned at the start
    pub file: tokio::fs::File,
}

impl Artifact {
    async fn open(path: PathBuf) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(&path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book.txt".to_string());
        Ok(Self {
            path,
            file_name,
            len,
            file,
        })
    }

    /// Stream the file contents as byte chunks
    pub fn into_stream(self) -> ReaderStream<tokio::fs::File> {
        ReaderStream::new(self.file)
    }
}

impl NovelDownloader {
    /// Start downloading a book
    ///
    /// Registers a `running` task and spawns its work in the background; the
    /// call returns as soon as the task is registered.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `book_id` is empty or contains characters
    ///   other than ASCII letters, digits, `-` and `_`
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    pub async fn create_task(&self, book_id: &str) -> Result<TaskId> {
        if !self.control.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let book_id = book_id.trim();
        if book_id.is_empty() {
            return Err(Error::InvalidInput("book id must not be empty".to_string()));
        }
        if !book_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidInput(format!(
                "book id {book_id:?} contains unsupported characters"
            )));
        }

        let id = TaskId::generate();
        let cancel = CancellationToken::new();
        self.registry
            .insert(DownloadTask::new(id.clone(), book_id), cancel.clone())
            .await;

        tracing::info!(task_id = %id, book_id, "Task created");
        self.emit_event(Event::TaskCreated {
            id: id.clone(),
            book_id: book_id.to_string(),
        });

        self.spawn_run(&id, book_id, cancel).await;
        Ok(id)
    }

    /// Current fields of a task
    pub async fn get_task_status(&self, id: &TaskId) -> Result<DownloadTask> {
        self.registry
            .snapshot(id)
            .await
            .ok_or_else(|| TaskError::NotFound { id: id.clone() }.into())
    }

    /// Every registered task, oldest first
    pub async fn list_tasks(&self) -> Vec<DownloadTask> {
        self.registry.list().await
    }

    /// Ask a task to stop at its next chunk boundary
    ///
    /// Idempotent: stopping a task that is already stopping, stopped or
    /// finished succeeds without effect. The state changes to `stopped` only
    /// once the running chunk has settled and the checkpoint is written.
    pub async fn stop_task(&self, id: &TaskId) -> Result<bool> {
        let state = self
            .registry
            .with_entry(id, |entry| {
                entry.cancel.cancel();
                entry.task.state
            })
            .await
            .ok_or_else(|| TaskError::NotFound { id: id.clone() })?;

        tracing::info!(task_id = %id, state = %state, "Stop requested");
        Ok(true)
    }

    /// Restart a stopped task from its checkpoint
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown id
    /// - [`TaskError::InvalidState`] unless the task is `stopped`
    pub async fn resume_task(&self, id: &TaskId) -> Result<()> {
        if !self.control.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let transition = self
            .registry
            .with_entry(id, |entry| {
                if entry.task.state != TaskState::Stopped {
                    return Err(TaskError::InvalidState {
                        id: id.clone(),
                        operation: "resume".to_string(),
                        current_state: entry.task.state.to_string(),
                    });
                }
                let cancel = CancellationToken::new();
                entry.cancel = cancel.clone();
                entry.task.state = TaskState::Running;
                entry.task.message = "Resuming download...".to_string();
                Ok((entry.task.book_id.clone(), cancel))
            })
            .await
            .ok_or_else(|| TaskError::NotFound { id: id.clone() })?;

        let (book_id, cancel) = transition?;

        tracing::info!(task_id = %id, book_id = %book_id, "Task resumed");
        self.emit_event(Event::Resumed { id: id.clone() });

        self.spawn_run(id, &book_id, cancel).await;
        Ok(())
    }

    /// Open the final artifact of a completed task
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown id
    /// - [`TaskError::NotReady`] until the task is `completed`
    /// - [`TaskError::ArtifactMissing`] if the file was removed from disk
    pub async fn fetch_artifact(&self, id: &TaskId) -> Result<Artifact> {
        let task = self.get_task_status(id).await?;
        if task.state != TaskState::Completed {
            return Err(TaskError::NotReady { id: id.clone() }.into());
        }

        let path = task
            .artifact_path
            .ok_or_else(|| TaskError::ArtifactMissing { id: id.clone() })?;

        match Artifact::open(path).await {
            Ok(artifact) => Ok(artifact),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TaskError::ArtifactMissing { id: id.clone() }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Open whatever `.txt` output currently exists for the task's book
    ///
    /// Works in any state, including mid-download; the content is whatever
    /// has been appended so far.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown id
    /// - [`Error::NotFound`] when no output file exists yet
    pub async fn fetch_partial_artifact(&self, id: &TaskId) -> Result<Artifact> {
        let task = self.get_task_status(id).await?;
        let book_dir = self.config.download.download_dir.join(&task.book_id);

        let path = match task.artifact_path.filter(|p| p.exists()) {
            Some(path) => Some(path),
            None => find_text_file(&book_dir).await,
        };

        let path = path.ok_or_else(|| {
            Error::NotFound(format!("no output yet for book {}", task.book_id))
        })?;

        Ok(Artifact::open(path).await?)
    }

    /// Spawn one run of a task and record its handle
    async fn spawn_run(&self, id: &TaskId, book_id: &str, cancel: CancellationToken) {
        let ctx = DownloadTaskContext {
            id: id.clone(),
            book_id: book_id.to_string(),
            registry: self.registry.clone(),
            provider: self.provider.clone(),
            checkpoints: self.checkpoints.clone(),
            config: self.config.clone(),
            event_tx: self.event_tx.clone(),
            control: self.control.clone(),
            cancel_token: cancel,
        };

        let handle = tokio::spawn(run_download_task(ctx));
        self.registry.set_handle(id, handle).await;
    }
}
