//! Core types for novel-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Unique identifier for a download task
///
/// Opaque to callers. Generated as a random UUID (simple form) when a task is
/// created and never changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh random task id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a download task
///
/// `Running` is the initial state. `Completed` and `Error` are terminal.
/// `Stopped` can be resumed back into `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Chapters are being fetched
    Running,
    /// Stopped at a chunk boundary by request, resumable
    Stopped,
    /// Every chapter processed, artifact available
    Completed,
    /// Task-fatal failure
    Error,
}

impl TaskState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Error)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Running => "running",
            TaskState::Stopped => "stopped",
            TaskState::Completed => "completed",
            TaskState::Error => "error",
        };
        f.write_str(s)
    }
}

/// One in-flight or finished download job
///
/// Returned by value from status queries; the registry owns the live copy.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadTask {
    /// Task identifier
    pub id: TaskId,
    /// Book identifier on the origin service
    pub book_id: String,
    /// Lifecycle state
    pub state: TaskState,
    /// Progress percentage (0 to 100)
    pub progress: u8,
    /// Human-readable status message
    pub message: String,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the task last entered a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Final artifact path, set only once the task completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    /// Book title, once metadata has been resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_title: Option<String>,
    /// Number of chapters in the book (0 until the chapter list is resolved)
    pub chapters_total: usize,
    /// Number of leading chapters settled so far (appended or skipped as failed)
    pub chapters_done: usize,
    /// Number of chapters that could not be fetched from any source
    pub chapters_failed: usize,
}

impl DownloadTask {
    /// Create a new task in the `Running` state
    pub fn new(id: TaskId, book_id: impl Into<String>) -> Self {
        Self {
            id,
            book_id: book_id.into(),
            state: TaskState::Running,
            progress: 0,
            message: "Starting download...".to_string(),
            created_at: Utc::now(),
            finished_at: None,
            artifact_path: None,
            book_title: None,
            chapters_total: 0,
            chapters_done: 0,
            chapters_failed: 0,
        }
    }
}

/// One retrievable unit of a book
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Remote identifier understood by the origin service
    pub id: String,
    /// Display ordinal (1-based), derived from the position in the chapter list
    pub ordinal: usize,
    /// Zero-based index within the book
    pub index: usize,
}

impl Chapter {
    /// Build the ordered chapter list from remote ids, skipping blank ids
    ///
    /// Ordinals follow the raw catalog position, so a blank id leaves a gap
    /// in the numbering instead of shifting later chapters down.
    pub fn from_ids<I, S>(ids: I) -> Vec<Chapter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter()
            .map(Into::<String>::into)
            .enumerate()
            .filter(|(_, id)| !id.trim().is_empty())
            .map(|(index, id)| Chapter {
                id,
                ordinal: index + 1,
                index,
            })
            .collect()
    }

    /// Heading label written before the chapter body, e.g. `第3章`
    pub fn label(&self) -> String {
        format!("第{}章", self.ordinal)
    }
}

/// Decrypted, normalized content of one chapter
///
/// Both fields absent signals that every source failed for this chapter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChapterContent {
    /// Chapter title, when the source provided one
    pub title: Option<String>,
    /// Normalized body text
    pub body: Option<String>,
}

impl ChapterContent {
    /// Content for a chapter that could not be fetched
    pub fn absent() -> Self {
        Self::default()
    }

    /// Whether there is a body to write
    pub fn is_present(&self) -> bool {
        self.body.as_deref().is_some_and(|b| !b.is_empty())
    }
}

/// Book metadata written into the artifact header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    /// Book title
    pub title: String,
    /// Author name
    pub author: String,
    /// Short description
    pub description: String,
}

impl BookInfo {
    /// Placeholder metadata used when the book page cannot be scraped
    pub fn unknown(book_id: &str) -> Self {
        Self {
            title: format!("未知小说_{book_id}"),
            author: "未知作者".to_string(),
            description: "无简介".to_string(),
        }
    }

    /// Artifact header: title, author, description, blank line
    pub fn header(&self) -> String {
        format!(
            "小说名: {}\n作者: {}\n内容简介: {}\n\n",
            self.title, self.author, self.description
        )
    }
}

/// Event emitted during a task's lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task registered and started
    TaskCreated {
        /// Task ID
        id: TaskId,
        /// Book ID
        book_id: String,
    },

    /// A chunk settled and progress advanced
    Progress {
        /// Task ID
        id: TaskId,
        /// Progress percentage (0 to 100)
        percent: u8,
        /// Chapters settled so far
        completed: usize,
        /// Chapters in the book
        total: usize,
    },

    /// One chapter could not be fetched from any source
    ChapterFailed {
        /// Task ID
        id: TaskId,
        /// Remote chapter identifier
        chapter_id: String,
        /// Display ordinal of the chapter
        ordinal: usize,
    },

    /// Task stopped at a chunk boundary
    Stopped {
        /// Task ID
        id: TaskId,
        /// Chapters settled when the task stopped
        completed: usize,
    },

    /// Stopped task resumed
    Resumed {
        /// Task ID
        id: TaskId,
    },

    /// Task finished and the artifact is ready
    Completed {
        /// Task ID
        id: TaskId,
        /// Artifact path
        path: PathBuf,
        /// Chapters that failed and were skipped
        chapters_failed: usize,
    },

    /// Task failed with a task-fatal error
    Failed {
        /// Task ID
        id: TaskId,
        /// Error description
        error: String,
    },

    /// Task removed by the janitor after its retention window
    TaskRemoved {
        /// Task ID
        id: TaskId,
    },

    /// Downloader is shutting down
    Shutdown,
}
