use super::*;
use crate::downloader::test_helpers::{MockProvider, wait_for_state};
use crate::types::{DownloadTask, TaskId, TaskState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;


/// Helper to create a test NovelDownloader wrapped in Arc, plus its router
async fn create_test_app(
    provider: MockProvider,
) -> (Arc<NovelDownloader>, Router, tempfile::TempDir) {
    let (downloader, temp_dir) =
        crate::downloader::test_helpers::create_test_downloader(Arc::new(provider), 20).await;
    let downloader = Arc::new(downloader);
    let app = create_router(downloader.clone(), downloader.get_config());
    (downloader, app, temp_dir)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (downloader, _app, _temp_dir) = create_test_app(MockProvider::new(1)).await;

    let mut config = (*downloader.get_config()).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let downloader = downloader.clone();
        let config = config.clone();
        async move { start_api_server(downloader, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    // shutting down the downloader ends the server gracefully
    downloader.shutdown().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (downloader, _app, _temp_dir) = create_test_app(MockProvider::new(1)).await;

    let mut config = (*downloader.get_config()).clone();
    config.api.cors_enabled = true;
    config.api.cors_origins = vec!["*".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (downloader, _app, _temp_dir) = create_test_app(MockProvider::new(1)).await;

    let mut config = (*downloader.get_config()).clone();
    config.api.cors_enabled = false;
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("access-control-allow-origin").is_none());
}
