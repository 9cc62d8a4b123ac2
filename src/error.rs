use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no primary shipping address on file")]
    MissingPrimaryAddress,

    #[error("batch of {0} bags is not available at this rank")]
    BatchSizeNotAllowed(u32),

    #[error("not enough bags: requested {requested}, remaining {remaining}")]
    InsufficientBags { requested: u32, remaining: u32 },

    #[error("drop-off location is outside the campaign area")]
    GeofenceMismatch,

    #[error("photo upload failed: {0}")]
    Upload(String),

    #[error("geocoding failed: {0}")]
    Geocoding(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::MissingPrimaryAddress
            | AppError::BatchSizeNotAllowed(_)
            | AppError::InsufficientBags { .. }
            | AppError::GeofenceMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upload(_) | AppError::Geocoding(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<AppError> for tonic::Status {
    fn from(err: AppError) -> Self {
        let message = err.to_string();
        match err {
            AppError::NotFound(_) => tonic::Status::not_found(message),
            AppError::BadRequest(_) => tonic::Status::invalid_argument(message),
            AppError::Conflict(_) => tonic::Status::aborted(message),
            AppError::MissingPrimaryAddress
            | AppError::BatchSizeNotAllowed(_)
            | AppError::InsufficientBags { .. }
            | AppError::GeofenceMismatch => tonic::Status::failed_precondition(message),
            AppError::Upload(_) | AppError::Geocoding(_) => tonic::Status::unavailable(message),
            AppError::Internal(_) => tonic::Status::internal(message),
        }
    }
}
