use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::utils::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    ServiceError,
    PayloadTooLarge,
    InternalError,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Not Found: {0}")]
    NotFound(String),

    /// A collaborator (insertion routine, query service) failed.
    #[error("Service error in {origin}: {source}")]
    Service {
        origin: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wraps a collaborator failure, tagging it with the module it surfaced in.
    pub fn service(origin: &'static str, source: anyhow::Error) -> Self {
        AppError::Service { origin, source }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Service { .. } => ErrorCode::ServiceError,
            AppError::PayloadTooLarge(_) => ErrorCode::PayloadTooLarge,
            AppError::Io(_) | AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Service { .. } | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match self {
            AppError::Validation(e) => {
                tracing::warn!(code = e.code, "Validation error: {}", e.message);
                e.message
            }
            AppError::NotFound(msg) | AppError::PayloadTooLarge(msg) => msg,
            AppError::Service { origin, source } => {
                tracing::error!(origin, "Service error: {:?}", source);
                source.to_string()
            }
            AppError::Io(e) => {
                tracing::error!("I/O error: {:?}", e);
                "Internal Server Error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal Server Error".to_string()
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
