//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps mapper errors to HTTP status codes with JSON bodies. Internal
//! details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rowseal_mapper::{MapperError, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error returned by handlers.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request is well-formed but semantically invalid (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The stored state prevents the operation (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            Self::Internal(_) => {
                tracing::error!(error = %self, "internal server error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<MapperError> for AppError {
    fn from(err: MapperError) -> Self {
        match &err {
            MapperError::NotFound { .. } | MapperError::UnknownEntity(_) => Self::NotFound(err.to_string()),
            MapperError::DecryptionUnavailable { .. } => Self::Conflict(err.to_string()),
            MapperError::RedactedField { .. }
            | MapperError::MissingPrimaryKey { .. }
            | MapperError::InvalidField { .. }
            | MapperError::InvalidQuery { .. }
            | MapperError::NotSigned(_) => Self::Validation(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rowseal_core::{EntityName, PrimaryKey};

    use super::*;

    fn entity() -> EntityName {
        EntityName::new("vcs.Project").unwrap()
    }

    #[test]
    fn test_mapper_errors_map_to_status() {
        let cases = [
            (
                MapperError::NotFound {
                    entity: entity(),
                    key: "k".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (MapperError::UnknownEntity("x".into()), StatusCode::NOT_FOUND),
            (
                MapperError::DecryptionUnavailable {
                    entity: entity(),
                    key: PrimaryKey::from("k"),
                    field: "token".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                MapperError::RedactedField {
                    entity: entity(),
                    field: "token".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (MapperError::NotSigned(entity()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                MapperError::Crypto {
                    entity: entity(),
                    operation: "sign",
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_and_code().0, status);
        }
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        use http_body_util::BodyExt;

        let response = AppError::Internal("connection refused to 10.0.0.1".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let err: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.error.code, "INTERNAL_ERROR");
        assert!(!err.error.message.contains("10.0.0.1"));
    }
}
