use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use roomlink_core::ErrorCode;
use serde::Serialize;

/// Directory errors; each maps onto an HTTP status and a wire error code
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Duplicate username, email or room id
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Body parsed as JSON but does not fit the expected shape
    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
}

impl DirectoryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DirectoryError::Validation(_)
            | DirectoryError::Conflict(_)
            | DirectoryError::Unprocessable(_) => ErrorCode::Validation,
            DirectoryError::Auth(_) | DirectoryError::Forbidden(_) => ErrorCode::Auth,
            DirectoryError::NotFound(_) => ErrorCode::NotFound,
            DirectoryError::Storage(_)
            | DirectoryError::Serialization(_)
            | DirectoryError::Io(_)
            | DirectoryError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DirectoryError::Validation(_) => StatusCode::BAD_REQUEST,
            DirectoryError::Conflict(_) => StatusCode::CONFLICT,
            DirectoryError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DirectoryError::Auth(_) => StatusCode::UNAUTHORIZED,
            DirectoryError::Forbidden(_) => StatusCode::FORBIDDEN,
            DirectoryError::NotFound(_) => StatusCode::NOT_FOUND,
            DirectoryError::Storage(_)
            | DirectoryError::Serialization(_)
            | DirectoryError::Io(_)
            | DirectoryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DirectoryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
