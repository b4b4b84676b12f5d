use serde::{Deserialize, Serialize};

/// What the user asked the bot for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    QuizNow,
    QuizScheduling,
    #[default]
    #[serde(other)]
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::QuizNow => "quiz_now",
            Intent::QuizScheduling => "quiz_scheduling",
            Intent::General => "general",
        }
    }
}

/// Classifier output: the intent plus whatever arguments it extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IntentDecision {
    #[serde(default)]
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

impl IntentDecision {
    pub fn general() -> Self {
        Self::default()
    }
}
