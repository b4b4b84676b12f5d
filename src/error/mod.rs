mod llm;
mod openedu;

pub use llm::LlmError;
pub use openedu::{ApiErrorBody, ApiErrorObject, OpenEduError};

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
