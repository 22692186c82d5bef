use crate::services::admission::AdmissionError;
use crate::services::upload_service::UploadError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Uniform error body. `stack` is only filled outside production, by
/// [`crate::api::middleware::error_envelope`].
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stack: Option<String>,
}

/// Diagnostic detail attached to error responses as an extension.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Admission(AdmissionError::InvalidFileType { .. }) => StatusCode::BAD_REQUEST,
            AppError::Admission(AdmissionError::SizeLimitExceeded { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            AppError::Admission(AdmissionError::CountLimitExceeded { .. }) => {
                StatusCode::BAD_REQUEST
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Rejected(e) => AppError::Admission(e),
            UploadError::BodyTooLarge => {
                AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".into())
            }
            UploadError::Stream(msg) => AppError::BadRequest(msg),
            UploadError::Storage(e) => AppError::Anyhow(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = ErrorDetail(format!("{:?}", self));

        let message = match &self {
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                "Internal Server Error".to_string()
            }
            AppError::BadRequest(msg) | AppError::NotFound(msg) | AppError::PayloadTooLarge(msg) => {
                msg.clone()
            }
            AppError::Admission(e) => e.to_string(),
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            stack: None,
        });

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(detail);
        response
    }
}
