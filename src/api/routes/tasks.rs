//! Task control and artifact handlers.

use super::{CreateTaskRequest, CreateTaskResponse, TaskActionResponse};
use crate::api::AppState;
use crate::downloader::Artifact;
use crate::error::Result;
use crate::types::TaskId;
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// POST /tasks - Start downloading a book
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created and running", body = CreateTaskResponse),
        (status = 400, description = "Invalid book id", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse> {
    let task_id = state.downloader.create_task(&request.book_id).await?;
    Ok((StatusCode::CREATED, Json(CreateTaskResponse { task_id })))
}

/// GET /tasks - List all tasks
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    responses(
        (status = 200, description = "Every registered task, oldest first", body = Vec<crate::types::DownloadTask>)
    )
)]
pub async fn list_tasks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.list_tasks().await)
}

/// GET /tasks/:id - Get task status
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task status", body = crate::types::DownloadTask),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let task = state.downloader.get_task_status(&TaskId::from(id)).await?;
    Ok(Json(task))
}

/// POST /tasks/:id/stop - Stop at the next chunk boundary
#[utoipa::path(
    post,
    path = "/tasks/{id}/stop",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Stop requested", body = TaskActionResponse),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn stop_task(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let id = TaskId::from(id);
    let success = state.downloader.stop_task(&id).await?;
    let task = state.downloader.get_task_status(&id).await?;
    Ok(Json(TaskActionResponse {
        success,
        state: task.state,
    }))
}

/// POST /tasks/:id/resume - Resume a stopped task
#[utoipa::path(
    post,
    path = "/tasks/{id}/resume",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task resumed", body = TaskActionResponse),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task is not stopped", body = crate::error::ApiError)
    )
)]
pub async fn resume_task(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let id = TaskId::from(id);
    state.downloader.resume_task(&id).await?;
    let task = state.downloader.get_task_status(&id).await?;
    Ok(Json(TaskActionResponse {
        success: true,
        state: task.state,
    }))
}

/// GET /tasks/:id/file - Download the finished artifact
#[utoipa::path(
    get,
    path = "/tasks/{id}/file",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Book text", content_type = "text/plain"),
        (status = 404, description = "Task or artifact not found", body = crate::error::ApiError),
        (status = 409, description = "Task has not completed", body = crate::error::ApiError)
    )
)]
pub async fn fetch_artifact(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let artifact = state.downloader.fetch_artifact(&TaskId::from(id)).await?;
    Ok(stream_artifact(artifact))
}

/// GET /tasks/:id/partial - Download whatever has been written so far
#[utoipa::path(
    get,
    path = "/tasks/{id}/partial",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Book text written so far", content_type = "text/plain"),
        (status = 404, description = "Task not found or nothing written yet", body = crate::error::ApiError)
    )
)]
pub async fn fetch_partial_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let artifact = state
        .downloader
        .fetch_partial_artifact(&TaskId::from(id))
        .await?;
    Ok(stream_artifact(artifact))
}

fn stream_artifact(artifact: Artifact) -> Response {
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(&artifact.file_name)
    );
    let len = artifact.len;

    let mut response = Body::from_stream(artifact.into_stream()).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
