//! Process-wide task registry
//!
//! Owns every [`DownloadTask`] together with its cancellation token and the
//! handle of the spawned unit of work driving it. All mutation goes through
//! closures run under one write lock, so a status reader sees either the
//! state before an update or after it, never a mix.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::{DownloadTask, TaskId, TaskState};

/// A registered task and its control handles
pub(crate) struct TaskEntry {
    pub(crate) task: DownloadTask,
    /// Cancelled to request a stop at the next chunk boundary
    pub(crate) cancel: CancellationToken,
    /// Spawned orchestration for the current run, if any
    pub(crate) handle: Option<JoinHandle<()>>,
}

/// Shared map from task id to task entry
#[derive(Clone, Default)]
pub(crate) struct TaskRegistry {
    inner: Arc<RwLock<HashMap<TaskId, TaskEntry>>>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new task
    pub(crate) async fn insert(&self, task: DownloadTask, cancel: CancellationToken) {
        let mut tasks = self.inner.write().await;
        tasks.insert(
            task.id.clone(),
            TaskEntry {
                task,
                cancel,
                handle: None,
            },
        );
    }

    /// Copy of a task's current fields
    pub(crate) async fn snapshot(&self, id: &TaskId) -> Option<DownloadTask> {
        let tasks = self.inner.read().await;
        tasks.get(id).map(|entry| entry.task.clone())
    }

    /// Copies of every registered task, oldest first
    pub(crate) async fn list(&self) -> Vec<DownloadTask> {
        let tasks = self.inner.read().await;
        let mut all: Vec<DownloadTask> = tasks.values().map(|e| e.task.clone()).collect();
        all.sort_by_key(|t| t.created_at);
        all
    }

    /// Apply `f` to a task's fields atomically; false if the task is unknown
    pub(crate) async fn update<F>(&self, id: &TaskId, f: F) -> bool
    where
        F: FnOnce(&mut DownloadTask),
    {
        let mut tasks = self.inner.write().await;
        match tasks.get_mut(id) {
            Some(entry) => {
                f(&mut entry.task);
                true
            }
            None => false,
        }
    }

    /// Run `f` against the whole entry under the write lock
    pub(crate) async fn with_entry<R, F>(&self, id: &TaskId, f: F) -> Option<R>
    where
        F: FnOnce(&mut TaskEntry) -> R,
    {
        let mut tasks = self.inner.write().await;
        tasks.get_mut(id).map(f)
    }

    /// Record the handle of a freshly spawned run
    pub(crate) async fn set_handle(&self, id: &TaskId, handle: JoinHandle<()>) {
        let mut tasks = self.inner.write().await;
        if let Some(entry) = tasks.get_mut(id) {
            entry.handle = Some(handle);
        }
    }

    /// Drop a task from the registry
    pub(crate) async fn remove(&self, id: &TaskId) -> Option<TaskEntry> {
        let mut tasks = self.inner.write().await;
        tasks.remove(id)
    }

    /// Signal every running task to stop and take their run handles
    pub(crate) async fn cancel_running(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = self.inner.write().await;
        tasks
            .values_mut()
            .filter(|entry| entry.task.state == TaskState::Running)
            .filter_map(|entry| {
                entry.cancel.cancel();
                entry.handle.take()
            })
            .collect()
    }

    /// Whether any registered task targets `book_id`
    pub(crate) async fn has_book(&self, book_id: &str) -> bool {
        let tasks = self.inner.read().await;
        tasks.values().any(|entry| entry.task.book_id == book_id)
    }

    /// Terminal tasks matching `expired`
    pub(crate) async fn terminal_where<F>(&self, expired: F) -> Vec<TaskId>
    where
        F: Fn(&DownloadTask) -> bool,
    {
        let tasks = self.inner.read().await;
        tasks
            .values()
            .filter(|entry| entry.task.state.is_terminal() && expired(&entry.task))
            .map(|entry| entry.task.id.clone())
            .collect()
    }
}
