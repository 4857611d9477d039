use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::chat::UpstreamError;
use crate::inference::InferenceError;
use crate::preprocess::PreprocessError;
use crate::upload::UploadError;

/// Errors surfaced by request handlers.
///
/// Every variant renders as a flat `{"error": "<message>"}` body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    MissingFile(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidInput(String),

    /// Carries the message shown to the client, never the upstream detail.
    #[error("{0}")]
    Upstream(&'static str),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFile(_) | Self::BadRequest(_) | Self::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Upstream(_) | Self::Inference(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::NoFilePart => AppError::MissingFile("No file part"),
            UploadError::NoSelectedFile => AppError::MissingFile("No selected file"),
            UploadError::Multipart(msg) => AppError::BadRequest(msg),
            UploadError::Io(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<PreprocessError> for AppError {
    fn from(err: PreprocessError) -> Self {
        match err {
            PreprocessError::Io(e) => AppError::Internal(e.to_string()),
            other => AppError::InvalidInput(other.to_string()),
        }
    }
}

impl From<InferenceError> for AppError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Preprocess(e) => e.into(),
            other => AppError::Inference(other.to_string()),
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(err: UpstreamError) -> Self {
        tracing::error!(error = %err, "Hosted language service call failed");
        AppError::Upstream("Failed to process the request")
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        assert_eq!(
            AppError::MissingFile("No file part").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidInput("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_detail_is_swallowed() {
        let err: AppError = UpstreamError::Status {
            status: 503,
            body: "secret quota detail".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Failed to process the request");
    }

    #[test]
    fn preprocess_failure_is_client_error() {
        let err: AppError = InferenceError::Preprocess(PreprocessError::NoSamples).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
