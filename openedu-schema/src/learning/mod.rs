mod intent;
mod quiz;

pub use intent::{Intent, IntentDecision};
pub use quiz::{FlashcardDraft, PublicQuizQuestion, QuizQuestion};
