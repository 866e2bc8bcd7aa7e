use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::gateways::GatewayError;
use crate::repository::RepositoryError;
use crate::storage::StorageError;

/// Message returned to clients for every 5xx that has no more specific wording.
const GENERIC_SERVER_ERROR: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{context}: {source}")]
    ExternalService {
        context: &'static str,
        #[source]
        source: GatewayError,
    },
    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("Internal Server Error: {0}")]
    InternalError(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            StorageError::Io(_) => AppError::InternalError(err.to_string()),
        }
    }
}

// Malformed bodies and a missing JSON content type are client errors with the
// usual `{success, message}` body instead of axum's plain-text rejection.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ExternalService { .. }
            | AppError::Persistence(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Client errors echo their message; server errors are logged and masked.
        let message = match &self {
            AppError::InvalidRequest(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::NotFound(msg) => msg.clone(),
            AppError::ExternalService { context, .. } => {
                error!(error = %self, "external service call failed");
                context.to_string()
            }
            AppError::Persistence(_) | AppError::InternalError(_) => {
                error!(error = %self, "request failed");
                GENERIC_SERVER_ERROR.to_string()
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}
