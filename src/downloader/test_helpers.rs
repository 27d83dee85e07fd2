//! Shared test helpers for creating NovelDownloader instances in tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

use crate::acquisition::ContentProvider;
use crate::config::Config;
use crate::downloader::NovelDownloader;
use crate::error::{AcquisitionError, Result};
use crate::types::{BookInfo, Chapter, ChapterContent, TaskId, TaskState};

/// In-memory [`ContentProvider`] serving chapters `c1..=cN`
///
/// Chapter `cK` has title `标题K` and body `正文K`.
pub(crate) struct MockProvider {
    chapter_ids: Vec<String>,
    info: Option<BookInfo>,
    /// Chapter ids in the order their fetch started
    pub(crate) requested: Mutex<Vec<String>>,
    /// Chapter ids that come back absent
    failing: HashSet<String>,
    /// When set, each fetch waits for one permit after recording itself
    gate: Option<Arc<tokio::sync::Semaphore>>,
    /// Number of fetches that have started
    pub(crate) started: AtomicUsize,
    catalog_error: bool,
    /// Metadata is served on the first lookup only
    info_once: bool,
    info_calls: AtomicUsize,
}

impl MockProvider {
    pub(crate) fn new(chapters: usize) -> Self {
        Self {
            chapter_ids: (1..=chapters).map(|n| format!("c{n}")).collect(),
            info: Some(BookInfo {
                title: "测试之书".to_string(),
                author: "某人".to_string(),
                description: "一段简介".to_string(),
            }),
            requested: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            gate: None,
            started: AtomicUsize::new(0),
            catalog_error: false,
            info_once: false,
            info_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn without_info(mut self) -> Self {
        self.info = None;
        self
    }

    pub(crate) fn failing(mut self, ids: &[&str]) -> Self {
        self.failing = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<tokio::sync::Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Book page that answers once and is unreachable afterwards
    pub(crate) fn with_info_once(mut self) -> Self {
        self.info_once = true;
        self
    }

    pub(crate) fn with_catalog_error(mut self) -> Self {
        self.catalog_error = true;
        self
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentProvider for MockProvider {
    async fn chapter_list(&self, _book_id: &str) -> Result<Vec<Chapter>> {
        if self.catalog_error {
            return Err(AcquisitionError::CatalogUnavailable("directory request refused".into()).into());
        }
        Ok(Chapter::from_ids(self.chapter_ids.clone()))
    }

    async fn book_info(&self, _book_id: &str) -> Option<BookInfo> {
        let calls = self.info_calls.fetch_add(1, Ordering::SeqCst);
        if self.info_once && calls > 0 {
            return None;
        }
        self.info.clone()
    }

    async fn fetch_chapter(&self, chapter: &Chapter) -> ChapterContent {
        self.requested.lock().unwrap().push(chapter.id.clone());
        self.started.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.failing.contains(&chapter.id) {
            return ChapterContent::absent();
        }
        let n = chapter.id.trim_start_matches('c');
        ChapterContent {
            title: Some(format!("标题{n}")),
            body: Some(format!("正文{n}")),
        }
    }
}

/// Helper to create a test NovelDownloader around `provider`.
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader(
    provider: Arc<MockProvider>,
    chunk_size: usize,
) -> (NovelDownloader, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.chunk_size = chunk_size;
    config.mirrors = vec![];

    let downloader = NovelDownloader::with_provider(config, provider)
        .await
        .unwrap();
    (downloader, temp_dir)
}

/// Poll until the task reaches `state`, panicking after 5 seconds
pub(crate) async fn wait_for_state(downloader: &NovelDownloader, id: &TaskId, state: TaskState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let task = downloader.get_task_status(id).await.unwrap();
        if task.state == state {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "task {id} never reached {state}; last state {} ({})",
                task.state, task.message
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until at least `count` fetches have started
pub(crate) async fn wait_for_started(provider: &MockProvider, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while provider.started.load(Ordering::SeqCst) < count {
        if tokio::time::Instant::now() > deadline {
            panic!(
                "only {} of {count} fetches started",
                provider.started.load(Ordering::SeqCst)
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// The single `.txt` artifact written for `book_id`
pub(crate) fn artifact_text(downloader: &NovelDownloader, book_id: &str) -> String {
    let dir = downloader.config.download.download_dir.join(book_id);
    let path = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .unwrap();
    std::fs::read_to_string(path).unwrap()
}
