//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] - Task control and artifact downloads
//! - [`system`] - Health, events, OpenAPI

use serde::{Deserialize, Serialize};

mod system;
mod tasks;

pub use system::*;
pub use tasks::*;

/// Request body for POST /tasks
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateTaskRequest {
    /// Book identifier on the origin service
    pub book_id: String,
}

/// Response for POST /tasks
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateTaskResponse {
    /// Identifier of the new task
    pub task_id: crate::types::TaskId,
}

/// Response for POST /tasks/:id/stop and POST /tasks/:id/resume
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TaskActionResponse {
    /// Whether the request was accepted
    pub success: bool,
    /// Task state right after the request
    pub state: crate::types::TaskState,
}
