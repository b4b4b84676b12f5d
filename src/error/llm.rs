use reqwest::StatusCode;
use thiserror::Error as ThisError;

use super::IsRetryable;
use openedu_schema::OpenaiErrorBody;

/// Failures talking to the LLM upstream or interpreting what it returned.
#[derive(Debug, ThisError)]
pub enum LlmError {
    /// Transport-level failure (DNS, connect, timeouts, etc).
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Non-2xx answer; `body` is present when the upstream used the OpenAI error envelope.
    #[error("Upstream error: status={status}, message={message:.200}")]
    UpstreamStatus {
        status: StatusCode,
        message: String,
        body: Option<OpenaiErrorBody>,
    },

    #[error("Upstream returned no completion")]
    EmptyCompletion,

    /// The completion arrived but did not contain the JSON shape we asked for.
    #[error("Malformed model output: {0}")]
    Malformed(String),
}

impl IsRetryable for LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Reqwest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::UpstreamStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            LlmError::EmptyCompletion => true,
            LlmError::Malformed(_) => false,
        }
    }
}
