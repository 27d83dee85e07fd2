//! REST API server module
//!
//! Exposes task control over HTTP: create, inspect, stop and resume tasks,
//! download finished or partial artifacts, and follow task events.

use crate::{Config, NovelDownloader, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Tasks
/// - `POST /tasks` - Start downloading a book
/// - `GET /tasks` - List all tasks
/// - `GET /tasks/:id` - Get task status
/// - `POST /tasks/:id/stop` - Stop at the next chunk boundary
/// - `POST /tasks/:id/resume` - Resume a stopped task
/// - `GET /tasks/:id/file` - Download the finished artifact
/// - `GET /tasks/:id/partial` - Download whatever has been written so far
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /events` - Server-sent events stream
pub fn create_router(downloader: Arc<NovelDownloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let router = Router::new()
        // Tasks
        .route("/tasks", post(routes::create_task))
        .route("/tasks", get(routes::list_tasks))
        .route("/tasks/:id", get(routes::get_task))
        .route("/tasks/:id/stop", post(routes::stop_task))
        .route("/tasks/:id/resume", post(routes::resume_task))
        .route("/tasks/:id/file", get(routes::fetch_artifact))
        .route("/tasks/:id/partial", get(routes::fetch_partial_artifact))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin; otherwise only the listed
/// origins that parse as header values are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server stops or the downloader shuts down.
///
/// # Example
///
/// ```no_run
/// use novel_dl::{Config, NovelDownloader};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(NovelDownloader::new((*config).clone()).await?);
///
/// novel_dl::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(downloader: Arc<NovelDownloader>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let shutdown = downloader.shutdown_signal();
    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
