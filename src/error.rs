//! Error types for the HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::import::{ImportError, ImportFailure};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Unique key already taken by another record (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Import rejected or rolled back; carries file diagnostics when known
    #[error("Import failed: {0}")]
    Import(#[from] ImportFailure),

    /// Storage failure (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, extra) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            ApiError::Import(failure) => {
                let (status, code) = match &failure.error {
                    ImportError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "IMPORT_TIMEOUT"),
                    ImportError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                    ImportError::Referential(_) => (StatusCode::BAD_REQUEST, "REFERENCE_NOT_FOUND"),
                    _ => (StatusCode::BAD_REQUEST, "IMPORT_REJECTED"),
                };
                let extra = json!({
                    "diagnostics": failure.diagnostics,
                    "errors": failure.error.row_errors(),
                });
                (status, code, failure.error.to_string(), Some(extra))
            }
            ApiError::Database(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                err.to_string(),
                None,
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg, None),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let (Some(Value::Object(extra)), Some(target)) = (extra, error.as_object_mut()) {
            target.extend(extra);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::Diagnostics;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    }

    #[tokio::test]
    async fn bad_request_maps_to_400() {
        let response = ApiError::BadRequest("month must be 1-12".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
        assert_eq!(body["error"]["message"], "month must be 1-12");
    }

    #[tokio::test]
    async fn import_failure_carries_diagnostics_and_row_errors() {
        let diagnostics = Diagnostics {
            delimiter: ",".to_string(),
            line_count: 3,
            ..Diagnostics::default()
        };
        let failure = ImportFailure::new(
            ImportError::NoValidRows {
                errors: vec!["Line 2: missing required field(s): amount".to_string()],
            },
            &diagnostics,
        );

        let response = ApiError::from(failure).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "IMPORT_REJECTED");
        assert_eq!(body["error"]["diagnostics"]["delimiter"], ",");
        assert_eq!(body["error"]["diagnostics"]["lineCount"], 3);
        assert_eq!(body["error"]["errors"][0], "Line 2: missing required field(s): amount");
    }

    #[tokio::test]
    async fn timeout_is_a_gateway_timeout() {
        let response = ApiError::from(ImportFailure::from(ImportError::Timeout(30))).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
