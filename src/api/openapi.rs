//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa and served at
//! `/openapi.json`.

use utoipa::OpenApi;

/// OpenAPI documentation for the novel-dl REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "novel-dl REST API",
        version = "0.1.0",
        description = "REST API for resumable chapter-by-chapter novel downloads",
        license(
            name = "GPL-3.0-or-later"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Tasks
        crate::api::routes::create_task,
        crate::api::routes::list_tasks,
        crate::api::routes::get_task,
        crate::api::routes::stop_task,
        crate::api::routes::resume_task,
        crate::api::routes::fetch_artifact,
        crate::api::routes::fetch_partial_artifact,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::TaskId,
        crate::types::TaskState,
        crate::types::DownloadTask,
        crate::types::Event,
        crate::error::ApiError,
        crate::error::ErrorDetail,
        crate::api::routes::CreateTaskRequest,
        crate::api::routes::CreateTaskResponse,
        crate::api::routes::TaskActionResponse,
    )),
    tags(
        (name = "tasks", description = "Download task control and artifacts"),
        (name = "system", description = "Health, events and API documentation")
    )
)]
pub struct ApiDoc;
