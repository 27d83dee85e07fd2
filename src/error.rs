//! Error types for novel-dl
//!
//! This module provides the error taxonomy for the library:
//! - Crate-wide [`Error`] returned by the public API
//! - [`TaskError`] for request-level task control failures (unknown id, wrong state)
//! - [`AcquisitionError`] for chapter retrieval failures, most of which are
//!   recovered inside the acquisition layer and never reach a caller
//! - HTTP status code mapping and structured error bodies for the REST API

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::TaskId;

/// Result type alias for novel-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for novel-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "chunk_size")
        key: Option<String>,
    },

    /// Task control error (unknown task, invalid transition, artifact not ready)
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Chapter or catalog acquisition error
    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller supplied an unusable argument (e.g. an empty book id)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Task control errors, surfaced directly to the caller
#[derive(Debug, Error)]
pub enum TaskError {
    /// No task with this id is registered
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: TaskId,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: TaskId,
        /// The operation that was attempted (e.g., "resume")
        operation: String,
        /// The current state that prevents the operation (e.g., "completed")
        current_state: String,
    },

    /// The final artifact is requested before the task completed
    #[error("task {id} has not completed yet")]
    NotReady {
        /// The task ID whose artifact was requested
        id: TaskId,
    },

    /// The task completed but its artifact is gone from disk
    #[error("artifact for task {id} is missing")]
    ArtifactMissing {
        /// The task ID whose artifact was requested
        id: TaskId,
    },
}

/// Chapter and catalog acquisition errors
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Key exchange failed: malformed handshake inputs or unexpected response
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Connection failure or non-success HTTP status
    #[error("transport failed: {0}")]
    Transport(String),

    /// The request did not finish within the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Payload could not be base64-decoded, decrypted, unpadded or decompressed
    #[error("decryption failed: {0}")]
    Decrypt(String),

    /// Response parsed but did not have the expected shape
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Every source was exhausted for one chapter
    #[error("chapter {chapter_id} unavailable from all sources")]
    ChapterUnavailable {
        /// Remote chapter identifier
        chapter_id: String,
    },

    /// The chapter list for a book could not be resolved
    #[error("chapter list unavailable: {0}")]
    CatalogUnavailable(String),
}

impl From<reqwest::Error> for AcquisitionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AcquisitionError::Timeout(e.to_string())
        } else {
            AcquisitionError::Transport(e.to_string())
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "task_not_found",
///     "message": "task error: task 5f0c... not found",
///     "details": { "task_id": "5f0c..." }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "task_not_found", "invalid_state")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::InvalidInput(_) => 400,

            Error::NotFound(_) => 404,
            Error::Task(TaskError::NotFound { .. }) => 404,
            Error::Task(TaskError::ArtifactMissing { .. }) => 404,

            Error::Task(TaskError::InvalidState { .. }) => 409,
            Error::Task(TaskError::NotReady { .. }) => 409,

            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            Error::Acquisition(_) => 502,
            Error::Network(_) => 502,

            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Task(e) => match e {
                TaskError::NotFound { .. } => "task_not_found",
                TaskError::InvalidState { .. } => "invalid_state",
                TaskError::NotReady { .. } => "not_ready",
                TaskError::ArtifactMissing { .. } => "artifact_missing",
            },
            Error::Acquisition(e) => match e {
                AcquisitionError::Handshake(_) => "handshake_error",
                AcquisitionError::Transport(_) => "transport_error",
                AcquisitionError::Timeout(_) => "timeout",
                AcquisitionError::Decrypt(_) => "decrypt_error",
                AcquisitionError::UnexpectedResponse(_) => "unexpected_response",
                AcquisitionError::ChapterUnavailable { .. } => "chapter_unavailable",
                AcquisitionError::CatalogUnavailable(_) => "catalog_unavailable",
            },
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::NotFound(_) => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Task(TaskError::NotFound { id })
            | Error::Task(TaskError::NotReady { id })
            | Error::Task(TaskError::ArtifactMissing { id }) => Some(serde_json::json!({
                "task_id": id,
            })),
            Error::Task(TaskError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "task_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn task_id() -> TaskId {
        TaskId::from("abc123")
    }

    /// Returns (Error, expected_status_code, expected_error_code) for the
    /// variants the control surface and API actually produce.
    fn error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "chunk_size must be positive".into(),
                    key: Some("chunk_size".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::InvalidInput("empty book id".into()),
                400,
                "invalid_input",
            ),
            (
                Error::Task(TaskError::NotFound { id: task_id() }),
                404,
                "task_not_found",
            ),
            (
                Error::Task(TaskError::InvalidState {
                    id: task_id(),
                    operation: "resume".into(),
                    current_state: "completed".into(),
                }),
                409,
                "invalid_state",
            ),
            (
                Error::Task(TaskError::NotReady { id: task_id() }),
                409,
                "not_ready",
            ),
            (
                Error::Task(TaskError::ArtifactMissing { id: task_id() }),
                404,
                "artifact_missing",
            ),
            (
                Error::Acquisition(AcquisitionError::CatalogUnavailable("code 1".into())),
                502,
                "catalog_unavailable",
            ),
            (Error::ShuttingDown, 503, "shutting_down"),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_and_code() {
        for (error, status, code) in error_variants() {
            assert_eq!(error.status_code(), status, "status for {error}");
            assert_eq!(error.error_code(), code, "code for {error}");
        }
    }

    #[test]
    fn invalid_state_carries_details() {
        let api: ApiError = Error::Task(TaskError::InvalidState {
            id: task_id(),
            operation: "resume".into(),
            current_state: "completed".into(),
        })
        .into();

        assert_eq!(api.error.code, "invalid_state");
        let details = api.error.details.unwrap();
        assert_eq!(details["task_id"], "abc123");
        assert_eq!(details["operation"], "resume");
        assert_eq!(details["current_state"], "completed");
    }

    #[test]
    fn not_found_message_names_the_task() {
        let err = Error::Task(TaskError::NotFound { id: task_id() });
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn generic_errors_have_no_details() {
        let api: ApiError = Error::Other("boom".into()).into();
        assert_eq!(api.error.code, "internal_error");
        assert!(api.error.details.is_none());
    }
}
