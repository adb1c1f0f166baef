use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use crate::archive::StorageError;
use crate::retention::RetentionError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload exceeds {0} bytes")]
    PayloadTooLarge(usize),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("archive unreadable: {0}")]
    CorruptArchive(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::CorruptArchive(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::CorruptArchive(_) => "CORRUPT_ARCHIVE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::Internal(format!("log store: {}", value))
    }
}

impl From<RetentionError> for ApiError {
    fn from(value: RetentionError) -> Self {
        match value {
            RetentionError::NotFound(name) => ApiError::NotFound(format!("archive {name}")),
            RetentionError::CorruptArchive { filename, reason } => {
                ApiError::CorruptArchive(format!("{filename}: {reason}"))
            }
            RetentionError::Archival(
                err @ (StorageError::InvalidInput(_) | StorageError::PathTraversal(_)),
            ) => ApiError::InvalidPayload(err.to_string()),
            RetentionError::Archival(StorageError::NotFound(name)) => {
                ApiError::NotFound(format!("archive {name}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
