use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::interview::extract::ExtractionError;
use crate::llm_client::UpstreamError;
use crate::session::SessionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad client input: no file, empty job title, wrong file type.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File too large: {0}")]
    FileTooLarge(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Document rejected: {0}")]
    ResumeRejected(String),

    #[error("Only {found} usable questions generated (need at least {min})")]
    InsufficientQuestions { found: usize, min: usize },

    #[error("Rate limited for {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::FileTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE", msg.clone())
            }
            AppError::Extraction(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "EXTRACTION_ERROR",
                e.to_string(),
            ),
            AppError::ResumeRejected(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "NOT_A_RESUME",
                format!("The uploaded document doesn't appear to be a resume. {reason}")
                    .trim_end()
                    .to_string(),
            ),
            AppError::InsufficientQuestions { found, min } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INSUFFICIENT_QUESTIONS",
                format!(
                    "Only {found} usable questions could be generated (at least {min} needed). \
                    Try a different resume or job title."
                ),
            ),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Please try again in {retry_after_secs} seconds."),
            ),
            AppError::Upstream(e) => {
                tracing::error!("Upstream error: {e}");
                match e {
                    UpstreamError::QuotaExceeded(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "UPSTREAM_QUOTA",
                        "API quota exceeded. Please try again later.".to_string(),
                    ),
                    UpstreamError::Transient(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "UPSTREAM_UNAVAILABLE",
                        "API service temporarily unavailable. Please try again.".to_string(),
                    ),
                    UpstreamError::Fatal(_) => (
                        StatusCode::BAD_GATEWAY,
                        "LLM_ERROR",
                        "An AI processing error occurred".to_string(),
                    ),
                }
            }
            AppError::Session(e) => {
                tracing::error!("Session error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SESSION_ERROR",
                    "Your session could not be accessed".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });

        if let AppError::RateLimited { retry_after_secs } = &self {
            body["retry_after"] = json!(retry_after_secs);
            let mut response = (status, Json(body)).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            return response;
        }

        (status, Json(body)).into_response()
    }
}
