use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use exam_core::CacheError;
use serde::Serialize;
use thiserror::Error;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generation error: {0}")]
    Generation(#[from] CacheError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Audio error: {0}")]
    Audio(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Llm(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Generation(_) | ApiError::Audio(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::InvalidInput(_) | ApiError::NotFound(_) => {}
            ApiError::Llm(msg) => tracing::warn!("LLM error: {}", msg),
            ApiError::Generation(e) => tracing::error!("Generation error: {}", e),
            ApiError::Audio(e) => tracing::error!("Audio error: {:#}", e),
            ApiError::Internal(msg) => tracing::error!("Internal error: {}", msg),
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
