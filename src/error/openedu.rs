use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

use super::{IsRetryable, LlmError};

#[derive(Debug, ThisError)]
pub enum OpenEduError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: i64, available: i64 },

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Telegram API error: {description}")]
    Telegram {
        status: Option<StatusCode>,
        description: String,
    },

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<JsonRejection> for OpenEduError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonSyntaxError(e) => OpenEduError::InvalidJson(e.body_text()),
            JsonRejection::BytesRejection(e) => {
                OpenEduError::UnexpectedError(format!("Failed to read request body: {e}"))
            }
            other => OpenEduError::InvalidInput(other.body_text()),
        }
    }
}

impl IntoResponse for OpenEduError {
    fn into_response(self) -> Response {
        let (status, error_body) = match self {
            OpenEduError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ApiErrorObject::new("NOT_FOUND", format!("{what} not found")),
            ),

            OpenEduError::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject::new("INVALID_INPUT", message),
            ),

            OpenEduError::InvalidJson(message) => {
                tracing::warn!(debug_message = %message, "Request rejected: invalid JSON");
                (
                    StatusCode::BAD_REQUEST,
                    ApiErrorObject::new("INVALID_JSON", "invalid JSON"),
                )
            }

            OpenEduError::Conflict(message) => (
                StatusCode::CONFLICT,
                ApiErrorObject::new("CONFLICT", message),
            ),

            OpenEduError::InsufficientCredits {
                required,
                available,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                ApiErrorObject {
                    code: "INSUFFICIENT_CREDITS".to_string(),
                    message: "Not enough credits for this operation.".to_string(),
                    details: Some(serde_json::json!({
                        "required": required,
                        "available": available,
                    })),
                },
            ),

            OpenEduError::Llm(LlmError::Malformed(detail)) => {
                tracing::warn!(detail = %detail, "LLM returned malformed output");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorObject::new(
                        "BAD_UPSTREAM_PAYLOAD",
                        "Failed to parse upstream response.",
                    ),
                )
            }

            OpenEduError::Llm(LlmError::UpstreamStatus { status, .. })
                if status == StatusCode::TOO_MANY_REQUESTS =>
            {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    ApiErrorObject::new("RATE_LIMIT", "Upstream rate limit exceeded."),
                )
            }

            OpenEduError::Llm(e) => {
                tracing::warn!(error = %e, "LLM upstream error");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorObject::new("UPSTREAM_ERROR", "Upstream service error."),
                )
            }

            OpenEduError::Telegram { .. }
            | OpenEduError::ReqwestError(_)
            | OpenEduError::UrlError(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorObject::new("UPSTREAM_ERROR", "Upstream service error."),
            ),

            e @ (OpenEduError::DatabaseError(_)
            | OpenEduError::RactorError(_)
            | OpenEduError::JsonError(_)
            | OpenEduError::UnexpectedError(_)) => {
                tracing::error!(error = %e, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorObject::new("INTERNAL_ERROR", "An internal server error occurred."),
                )
            }
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Debug, Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiErrorObject {
    pub(crate) fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

impl IsRetryable for OpenEduError {
    fn is_retryable(&self) -> bool {
        match self {
            OpenEduError::Llm(e) => e.is_retryable(),
            OpenEduError::ReqwestError(_) => true,
            OpenEduError::Telegram { status, .. } => status.is_some_and(|s| {
                s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
            }),
            _ => false,
        }
    }
}
