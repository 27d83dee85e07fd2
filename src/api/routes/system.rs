//! System handlers: health, OpenAPI, events.

use crate::api::AppState;
use crate::types::Event;
use axum::{
    Json,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "accepting_tasks": state.downloader.is_accepting_tasks(),
        "chunk_size": state.config.download.chunk_size,
    }))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// GET /events - Server-sent events stream
#[utoipa::path(
    get,
    path = "/events",
    tag = "system",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = state.downloader.subscribe();
    let stream = BroadcastStream::new(receiver);

    let sse_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok(SseEvent::default()
                .event(event_name(&event))
                .data(json_data))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize event to JSON");
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE client lagged");
            Some(Ok(SseEvent::default().event("error").data(format!(
                r#"{{"error":"lagged","skipped":{skipped}}}"#
            ))))
        }
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

fn event_name(event: &Event) -> &'static str {
    match event {
        Event::TaskCreated { .. } => "task_created",
        Event::Progress { .. } => "progress",
        Event::ChapterFailed { .. } => "chapter_failed",
        Event::Stopped { .. } => "stopped",
        Event::Resumed { .. } => "resumed",
        Event::Completed { .. } => "completed",
        Event::Failed { .. } => "failed",
        Event::TaskRemoved { .. } => "task_removed",
        Event::Shutdown => "shutdown",
    }
}
