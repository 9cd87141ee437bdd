//! Errors returned by HTTP handlers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::core::bridge::RegistryError;

/// Handler-level error mapped onto an HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cannot determine the public host for the media stream URL")]
    MissingHost,

    #[error("Invalid Host header: {0}")]
    InvalidHost(String),

    #[error("Server at capacity ({limit} active calls)")]
    AtCapacity { limit: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingHost | AppError::InvalidHost(_) => StatusCode::BAD_REQUEST,
            AppError::AtCapacity { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AtCapacity { limit } => AppError::AtCapacity { limit },
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::MissingHost.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InvalidHost("a b".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::AtCapacity { limit: 2 }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_from_registry_error() {
        let err: AppError = RegistryError::AtCapacity { limit: 5 }.into();
        assert!(matches!(err, AppError::AtCapacity { limit: 5 }));
    }

    #[test]
    fn test_into_response() {
        let response = AppError::MissingHost.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
