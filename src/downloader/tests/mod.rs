//! Tests for the downloader control surface, janitor and shutdown.

use std::sync::Arc;
use std::time::Duration;

use crate::downloader::test_helpers::{
    MockProvider, artifact_text, create_test_downloader, wait_for_started, wait_for_state,
};
use crate::error::{Error, TaskError};
use crate::types::{Event, TaskId, TaskState};

use super::NovelDownloader;

mod lifecycle;

/// Poll until the task's status message equals `message`
async fn wait_for_message(downloader: &NovelDownloader, id: &TaskId, message: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let task = downloader.get_task_status(id).await.unwrap();
        if task.message == message {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} never showed {message:?}; last {:?}",
            task.message
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
