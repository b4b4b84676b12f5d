mod chat_request;
mod chat_response;
mod error;

pub use chat_request::{ChatCompletionRequest, ChatMessage, ChatRole, ResponseFormat};
pub use chat_response::{ChatChoice, ChatCompletionResponse, ChatUsage};
pub use error::{OpenaiErrorBody, OpenaiErrorObject};
