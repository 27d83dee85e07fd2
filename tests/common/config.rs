//! Test configuration helpers pointing a downloader at a mock origin

use std::time::Duration;
use tempfile::TempDir;
use novel_dl::config::RetryConfig;
use novel_dl::{Config, MirrorConfig, NovelDownloader, TaskId, TaskState};
use wiremock::MockServer;

/// Config whose origin, catalog and both mirrors live on `server`
///
/// Mirror one serves `/m1/content?item_id={chapter_id}`, mirror two
/// `/m2/{chapter_id}`.
pub fn config_for(server: &MockServer, temp_dir: &TempDir) -> Config {
    let uri = server.uri();
    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.request_timeout = Duration::from_secs(5);
    config.origin.api_base_url = uri.clone();
    config.origin.web_base_url = uri.clone();
    config.mirrors = vec![
        MirrorConfig::new("first", format!("{uri}/m1/content?item_id={{chapter_id}}")),
        MirrorConfig::new("second", format!("{uri}/m2/{{chapter_id}}")),
    ];
    config.retry = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Downloader against `server`, with its temp dir (which must be kept alive)
pub async fn downloader_for(server: &MockServer) -> (NovelDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = config_for(server, &temp_dir);
    let downloader = NovelDownloader::new(config).await.unwrap();
    (downloader, temp_dir)
}

/// Poll until the task reaches `state`, panicking after `timeout`
pub async fn wait_for_state(
    downloader: &NovelDownloader,
    id: &TaskId,
    state: TaskState,
    timeout: Duration,
) {
    let deadline = tokio::time::Instant::now() + timeout;
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
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
