//! Application error types and their HTTP mapping.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error model shared by request parsing, adapters, and handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Required input is missing or unusable.
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    BadMultipart(String),
    /// The separation tool failed or did not produce its stems.
    #[error("{0}")]
    Processing(String),
    /// The remote model call failed or returned unusable output.
    #[error("{0}")]
    Transcription(String),
    /// The video encoder failed.
    #[error("{0}")]
    Rendering(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Creates a `400 Bad Request` error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Creates a multipart parsing/shape validation error.
    pub fn bad_multipart(message: impl Into<String>) -> Self {
        Self::BadMultipart(message.into())
    }

    /// Creates a stem separation failure.
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing(message.into())
    }

    /// Creates a transcription failure.
    pub fn transcription(message: impl Into<String>) -> Self {
        Self::Transcription(message.into())
    }

    /// Creates a video rendering failure.
    pub fn rendering(message: impl Into<String>) -> Self {
        Self::Rendering(message.into())
    }

    /// Creates a generic internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::BadMultipart(_) => (StatusCode::BAD_REQUEST, "invalid_multipart"),
            AppError::Processing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "processing_failed"),
            AppError::Transcription(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "transcription_failed")
            }
            AppError::Rendering(_) => (StatusCode::INTERNAL_SERVER_ERROR, "rendering_failed"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::bad_multipart(format!(
            "invalid multipart request: {}",
            rejection.body_text()
        ))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }

        let payload = ErrorPayload {
            error: self.to_string(),
            code,
        };
        (status, Json(payload)).into_response()
    }
}
