//! HTTP error response handling for the API
//!
//! Converts domain errors to HTTP responses with the status code from
//! [`ToHttpStatus`] and a JSON [`ApiError`] body.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Errors normally go through Error::into_response, which knows the status
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::types::TaskId;

    async fn body_of(response: Response) -> ApiError {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_into_response() {
        let response = Error::NotFound("no output yet for book 42".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "not_found");
        assert!(api_error.error.message.contains("book 42"));
    }

    #[tokio::test]
    async fn test_invalid_state_into_response() {
        let error = Error::Task(TaskError::InvalidState {
            id: TaskId::from("t-1"),
            operation: "resume".to_string(),
            current_state: "running".to_string(),
        });
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let api_error = body_of(response).await;
        assert_eq!(api_error.error.code, "invalid_state");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["task_id"], "t-1");
        assert_eq!(details["current_state"], "running");
    }

    #[tokio::test]
    async fn test_shutting_down_into_response() {
        let response = Error::ShuttingDown.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_of(response).await.error.code, "shutting_down");
    }

    #[tokio::test]
    async fn test_api_error_defaults_to_500() {
        let response = ApiError::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
