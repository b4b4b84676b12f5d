pub mod learning;
pub mod openai;
pub mod telegram;

pub use learning::{FlashcardDraft, Intent, IntentDecision, PublicQuizQuestion, QuizQuestion};
pub use openai::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole, OpenaiErrorBody,
    ResponseFormat,
};
pub use telegram::{InlineKeyboardButton, InlineKeyboardMarkup, SendMessageRequest, TelegramUpdate};
