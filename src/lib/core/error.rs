use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Todo {0} not found")]
    NotFound(i64),
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Method not allowed for AJAX")]
    MethodNotAllowed,
    #[error("Invalid request")]
    InvalidRequest,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::Database(err) => {
                tracing::error!(error = %err, "database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error during data retrieval." })),
                )
                    .into_response()
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            AppError::InvalidJson(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "Error: Invalid JSON" })),
            )
                .into_response(),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(json!({ "status": "Method not allowed for AJAX" })),
            )
                .into_response(),
            AppError::InvalidRequest => {
                (StatusCode::BAD_REQUEST, "Invalid request").into_response()
            }
        }
    }
}
